//! Parser module for depsweep.
//!
//! Reads the npm manifest (package.json) that declares the dependencies
//! under analysis, and the manifests of installed packages.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use depsweep::parser::{read_manifest, extract_dependencies};
//!
//! let manifest = read_manifest(Path::new("package.json")).unwrap();
//! let deps = extract_dependencies(&manifest.package);
//! println!("Found {} declared dependencies", deps.len());
//! ```

pub mod package_json;
pub mod types;

pub use package_json::{
    extract_dependencies, parse_document, parse_str, read_manifest, Manifest, ParseError,
    ParseResult, MANIFEST_FILE,
};

pub use types::{Dependency, DependencyType, PackageJson};
