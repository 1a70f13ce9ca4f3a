//! Parser for npm package.json files.
//!
//! The project manifest is the one input the engine cannot do without:
//! failures here are structural and abort the run, unlike every other
//! read in the crate.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::types::{Dependency, DependencyType, PackageJson};

/// File name of an npm manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// Errors that can occur during package.json parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to read the file from disk.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse JSON content.
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The document is valid JSON but not a manifest object.
    #[error("Invalid package.json: {0}")]
    InvalidPackage(String),
}

/// Result type alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A parsed manifest: the typed view plus the untouched JSON document.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Where the manifest was read from (absolute when the caller passed one).
    pub path: PathBuf,
    /// Typed fields used by the engine.
    pub package: PackageJson,
    /// The whole document, for deep scans of arbitrary fields.
    pub document: Value,
}

impl Manifest {
    /// Script name to command line mapping (empty if none declared).
    pub fn scripts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.package
            .scripts
            .iter()
            .flatten()
            .map(|(name, cmd)| (name.as_str(), cmd.as_str()))
    }
}

/// Reads and parses a manifest from disk.
///
/// # Example
///
/// ```ignore
/// use std::path::Path;
/// use depsweep::parser::package_json::read_manifest;
///
/// let manifest = read_manifest(Path::new("package.json")).unwrap();
/// println!("Package: {:?}", manifest.package.name);
/// ```
pub fn read_manifest(path: &Path) -> ParseResult<Manifest> {
    let content = fs::read_to_string(path)?;
    let (package, document) = parse_document(&content)?;
    Ok(Manifest {
        path: path.to_path_buf(),
        package,
        document,
    })
}

/// Parses a package.json from a string into its typed view.
///
/// # Example
///
/// ```
/// use depsweep::parser::package_json::parse_str;
///
/// let json = r#"{"name": "my-app", "version": "1.0.0"}"#;
/// let pkg = parse_str(json).unwrap();
/// assert_eq!(pkg.name, Some("my-app".to_string()));
/// ```
pub fn parse_str(content: &str) -> ParseResult<PackageJson> {
    parse_document(content).map(|(package, _)| package)
}

/// Parses a package.json into both its typed view and raw document.
pub fn parse_document(content: &str) -> ParseResult<(PackageJson, Value)> {
    let document: Value = serde_json::from_str(content)?;
    if !document.is_object() {
        return Err(ParseError::InvalidPackage(
            "top-level value is not an object".to_string(),
        ));
    }
    let package: PackageJson = serde_json::from_value(document.clone())?;
    Ok((package, document))
}

/// Extracts all dependencies from a PackageJson into a normalized list.
///
/// A name declared in several sections appears once per section.
///
/// # Example
///
/// ```
/// use depsweep::parser::package_json::{parse_str, extract_dependencies};
/// use depsweep::parser::types::DependencyType;
///
/// let json = r#"{
///     "name": "my-app",
///     "dependencies": {"react": "^18.0.0"},
///     "devDependencies": {"typescript": "^5.0.0"}
/// }"#;
///
/// let pkg = parse_str(json).unwrap();
/// let deps = extract_dependencies(&pkg);
///
/// assert_eq!(deps.len(), 2);
/// assert!(deps.iter().any(|d| d.name == "react" && d.dep_type == DependencyType::Production));
/// assert!(deps.iter().any(|d| d.name == "typescript" && d.dep_type == DependencyType::Development));
/// ```
pub fn extract_dependencies(pkg: &PackageJson) -> Vec<Dependency> {
    let sections = [
        (&pkg.dependencies, DependencyType::Production),
        (&pkg.dev_dependencies, DependencyType::Development),
        (&pkg.peer_dependencies, DependencyType::Peer),
        (&pkg.optional_dependencies, DependencyType::Optional),
    ];

    let mut deps = Vec::new();
    for (section, dep_type) in sections {
        if let Some(map) = section {
            deps.extend(map.keys().map(|name| Dependency::new(name, dep_type)));
        }
    }
    deps
}
