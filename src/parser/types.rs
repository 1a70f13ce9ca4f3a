//! Shared types for manifest parsing.
//!
//! This module defines the data structures used to represent a
//! package.json manifest and the dependencies it declares.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Represents the structure of a package.json file.
///
/// Only the fields the usage engine reads are typed here; the full
/// document is kept separately as a [`serde_json::Value`] so arbitrary
/// fields (`eslintConfig`, `prettier`, `jest`, ...) can be deep-scanned.
///
/// # Example
///
/// ```
/// use depsweep::parser::types::PackageJson;
///
/// let json = r#"{"name": "my-app", "scripts": {"test": "jest"}}"#;
/// let pkg: PackageJson = serde_json::from_str(json).unwrap();
/// assert_eq!(pkg.name, Some("my-app".to_string()));
/// assert_eq!(pkg.scripts.unwrap()["test"], "jest");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PackageJson {
    /// The name of the package.
    pub name: Option<String>,

    /// Named command lines run through the package manager.
    pub scripts: Option<HashMap<String, String>>,

    /// Production dependencies required at runtime.
    pub dependencies: Option<HashMap<String, String>>,

    /// Development-only dependencies (testing, building, etc.).
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: Option<HashMap<String, String>>,

    /// Peer dependencies that the host package must provide.
    #[serde(rename = "peerDependencies")]
    pub peer_dependencies: Option<HashMap<String, String>>,

    /// Optional dependencies that enhance functionality if available.
    #[serde(rename = "optionalDependencies")]
    pub optional_dependencies: Option<HashMap<String, String>>,
}

impl PackageJson {
    /// Names this package requires when installed by someone else:
    /// runtime, peer and optional sections. Dev dependencies are not
    /// installed transitively and are left out.
    pub fn installed_requirements(&self) -> Vec<(&str, DependencyType)> {
        let sections = [
            (&self.dependencies, DependencyType::Production),
            (&self.peer_dependencies, DependencyType::Peer),
            (&self.optional_dependencies, DependencyType::Optional),
        ];

        let mut out = Vec::new();
        for (section, dep_type) in sections {
            if let Some(map) = section {
                out.extend(map.keys().map(|name| (name.as_str(), dep_type)));
            }
        }
        out
    }

    /// Merged, de-duplicated view of every declared dependency name.
    pub fn dependency_names(&self) -> BTreeSet<String> {
        [
            &self.dependencies,
            &self.dev_dependencies,
            &self.peer_dependencies,
            &self.optional_dependencies,
        ]
        .into_iter()
        .flatten()
        .flat_map(|map| map.keys().cloned())
        .collect()
    }
}

/// Categorizes the type of dependency relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// Production dependencies - required at runtime.
    #[default]
    Production,

    /// Development dependencies - only needed during development.
    Development,

    /// Peer dependencies - expected to be provided by the consumer.
    Peer,

    /// Optional dependencies - installation continues even if they fail.
    Optional,
}

impl DependencyType {
    /// Peer and optional dependencies are contracts with the consumer or
    /// the platform; removing them is only proposed in aggressive mode.
    pub fn is_protected(&self) -> bool {
        matches!(self, DependencyType::Peer | DependencyType::Optional)
    }
}

/// A declared dependency and the manifest section it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// The package name (e.g., "react", "@babel/core").
    pub name: String,

    pub dep_type: DependencyType,
}

impl Dependency {
    pub fn new(name: impl Into<String>, dep_type: DependencyType) -> Self {
        Self {
            name: name.into(),
            dep_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_type_protected() {
        assert!(!DependencyType::Production.is_protected());
        assert!(!DependencyType::Development.is_protected());
        assert!(DependencyType::Peer.is_protected());
        assert!(DependencyType::Optional.is_protected());
    }

    #[test]
    fn test_dependency_names_merges_sections() {
        let pkg: PackageJson = serde_json::from_str(
            r#"{
                "dependencies": {"react": "^18"},
                "devDependencies": {"jest": "^29"},
                "peerDependencies": {"react": ">=16"}
            }"#,
        )
        .unwrap();

        let names: Vec<_> = pkg.dependency_names().into_iter().collect();
        assert_eq!(names, vec!["jest".to_string(), "react".to_string()]);
    }

    #[test]
    fn test_installed_requirements_skip_dev() {
        let pkg: PackageJson = serde_json::from_str(
            r#"{
                "dependencies": {"a": "1"},
                "devDependencies": {"b": "1"},
                "peerDependencies": {"c": "1"},
                "optionalDependencies": {"d": "1"}
            }"#,
        )
        .unwrap();

        let mut reqs = pkg.installed_requirements();
        reqs.sort();
        assert_eq!(
            reqs,
            vec![
                ("a", DependencyType::Production),
                ("c", DependencyType::Peer),
                ("d", DependencyType::Optional),
            ]
        );
    }

    #[test]
    fn test_package_json_default() {
        let pkg = PackageJson::default();
        assert!(pkg.name.is_none());
        assert!(pkg.dependency_names().is_empty());
    }
}
