//! Type-declaration packages (`@types/*`).
//!
//! Nothing imports a type package by its own name, so these dependencies
//! are judged by what they describe: the runtime package, the compiler
//! configuration, or installed packages that expect them as peers.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::context::{ConfigValue, DependencyContext};
use crate::graph::installed_manifest_path;

/// Scope holding type-declaration packages.
pub const TYPES_SCOPE: &str = "@types/";

/// Type declarations for the Node.js runtime itself.
pub const NODE_TYPES: &str = "@types/node";

const TYPESCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// True for `@types/...` names.
pub fn is_type_package(name: &str) -> bool {
    name.starts_with(TYPES_SCOPE) && name.len() > TYPES_SCOPE.len()
}

/// Runtime package a type package describes.
///
/// ```
/// use depsweep::analysis::type_packages::runtime_package;
///
/// assert_eq!(runtime_package("@types/react").as_deref(), Some("react"));
/// assert_eq!(runtime_package("@types/babel__core").as_deref(), Some("@babel/core"));
/// assert_eq!(runtime_package("react"), None);
/// ```
pub fn runtime_package(name: &str) -> Option<String> {
    if !is_type_package(name) {
        return None;
    }
    let bare = &name[TYPES_SCOPE.len()..];
    match bare.split_once("__") {
        Some((scope, pkg)) if !scope.is_empty() && !pkg.is_empty() => {
            Some(format!("@{scope}/{pkg}"))
        }
        _ => Some(bare.to_string()),
    }
}

/// True if `path` is a TypeScript source file.
pub fn is_typescript_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            TYPESCRIPT_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

/// First TypeScript file in the corpus, if the language is in use.
pub fn first_typescript_file(files: &[PathBuf]) -> Option<&PathBuf> {
    files.iter().find(|path| is_typescript_file(path))
}

fn types_array_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#""types"\s*:\s*\[([^\]]*)\]"#).expect("hardcoded regex is valid")
    })
}

fn quoted_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("hardcoded regex is valid"))
}

/// Names listed under `compilerOptions.types` in a compiler configuration.
///
/// Configs with comments or trailing commas fail strict JSON parsing and
/// arrive as text, so those are scanned with a regex instead.
pub fn compiler_types(config: &ConfigValue) -> Vec<String> {
    match config {
        ConfigValue::Json(value) => value
            .pointer("/compilerOptions/types")
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        ConfigValue::Text(text) => types_array_regex()
            .captures_iter(text)
            .flat_map(|caps| {
                let list = caps.get(1).map_or("", |m| m.as_str());
                quoted_regex()
                    .captures_iter(list)
                    .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect(),
    }
}

fn is_tsconfig_key(key: &str) -> bool {
    let name = key.rsplit('/').next().unwrap_or(key);
    name.starts_with("tsconfig") && name.ends_with(".json")
}

/// Why a type package counts as used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// `@types/node` in a TypeScript project.
    LanguageRuntime { file: PathBuf },
    /// The described runtime package is used directly.
    RuntimePackage { runtime: String, files: Vec<PathBuf> },
    /// Listed in a compiler configuration's `types`.
    CompilerTypes { config: PathBuf },
    /// An installed package declares it as a peer dependency.
    PeerDependency { package: String, manifest: PathBuf },
}

impl Correlation {
    /// Short label for the source of support.
    pub fn supported_by(&self) -> String {
        match self {
            Correlation::LanguageRuntime { .. } => "typescript".to_string(),
            Correlation::RuntimePackage { runtime, .. } => runtime.clone(),
            Correlation::CompilerTypes { config } => config
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "tsconfig.json".to_string()),
            Correlation::PeerDependency { package, .. } => package.clone(),
        }
    }

    /// Files that back the correlation.
    pub fn evidence(&self) -> Vec<PathBuf> {
        match self {
            Correlation::LanguageRuntime { file } => vec![file.clone()],
            Correlation::RuntimePackage { files, .. } => files.clone(),
            Correlation::CompilerTypes { config } => vec![config.clone()],
            Correlation::PeerDependency { manifest, .. } => vec![manifest.clone()],
        }
    }
}

/// Applies the type-package rules for one analysis run.
pub struct TypeCorrelator<'a> {
    ctx: &'a DependencyContext,
    files: &'a [PathBuf],
    declared: &'a BTreeSet<String>,
}

impl<'a> TypeCorrelator<'a> {
    pub fn new(
        ctx: &'a DependencyContext,
        files: &'a [PathBuf],
        declared: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            ctx,
            files,
            declared,
        }
    }

    /// Checks the rules in order and returns the first that holds.
    ///
    /// `runtime_usage` yields the files directly using a runtime package;
    /// it is only called when the runtime is declared or installed.
    pub async fn correlate<F, Fut>(&self, dependency: &str, runtime_usage: F) -> Option<Correlation>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Vec<PathBuf>>,
    {
        let runtime = runtime_package(dependency)?;

        if dependency == NODE_TYPES {
            if let Some(file) = first_typescript_file(self.files) {
                return Some(Correlation::LanguageRuntime { file: file.clone() });
            }
        }

        let graph = self.ctx.package_graph().await;

        if self.declared.contains(&runtime) || graph.is_installed(&runtime) {
            let files = runtime_usage(runtime.clone()).await;
            if !files.is_empty() {
                return Some(Correlation::RuntimePackage { runtime, files });
            }
        }

        if let Some(config) = self.compiler_config_listing(dependency, &runtime) {
            return Some(Correlation::CompilerTypes { config });
        }

        let mut peers = graph.peer_dependents(dependency);
        peers.sort_unstable();
        if let Some(package) = peers.first() {
            return Some(Correlation::PeerDependency {
                package: package.to_string(),
                manifest: installed_manifest_path(self.ctx.project_root(), package),
            });
        }

        debug!(dependency, runtime = %runtime, "no type-package correlation");
        None
    }

    fn compiler_config_listing(&self, dependency: &str, runtime: &str) -> Option<PathBuf> {
        let mut keys: Vec<&String> = self
            .ctx
            .configs()
            .keys()
            .filter(|key| is_tsconfig_key(key))
            .collect();
        keys.sort();

        keys.into_iter().find_map(|key| {
            let config = self.ctx.configs().get(key)?;
            compiler_types(config)
                .iter()
                .any(|t| t == runtime || t == dependency)
                .then(|| self.ctx.project_root().join(key))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PackageGraph;
    use crate::parser::DependencyType;
    use serde_json::json;
    use std::cell::Cell;
    use std::collections::{BTreeMap, HashMap};

    fn context(configs: HashMap<String, ConfigValue>) -> DependencyContext {
        let ctx = DependencyContext::new("/project", BTreeMap::new(), configs);
        ctx.set_package_graph(PackageGraph::new());
        ctx
    }

    fn declared(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_runtime_package() {
        assert_eq!(runtime_package("@types/node").as_deref(), Some("node"));
        assert_eq!(runtime_package("@types/").as_deref(), None);
        assert_eq!(runtime_package("@types/a__").as_deref(), Some("a__"));
        assert!(is_type_package("@types/jest"));
        assert!(!is_type_package("types"));
    }

    #[test]
    fn test_typescript_detection() {
        let files = vec![PathBuf::from("/p/a.js"), PathBuf::from("/p/b.TSX")];
        assert_eq!(first_typescript_file(&files), Some(&files[1]));
        assert!(first_typescript_file(&files[..1]).is_none());
    }

    #[test]
    fn test_compiler_types_json_and_text() {
        let json = ConfigValue::Json(json!({"compilerOptions": {"types": ["jest", "node"]}}));
        assert_eq!(compiler_types(&json), vec!["jest", "node"]);

        let text = ConfigValue::Text(
            "{\n  // comment\n  \"compilerOptions\": { \"types\": [\"vitest/globals\", ], }\n}".into(),
        );
        assert_eq!(compiler_types(&text), vec!["vitest/globals"]);

        assert!(compiler_types(&ConfigValue::Json(json!({}))).is_empty());
    }

    #[tokio::test]
    async fn test_node_types_with_typescript_files() {
        let ctx = context(HashMap::new());
        let files = vec![PathBuf::from("/project/src/index.ts")];
        let names = declared(&["@types/node"]);
        let correlator = TypeCorrelator::new(&ctx, &files, &names);

        let found = correlator
            .correlate(NODE_TYPES, |_| async { Vec::new() })
            .await
            .unwrap();
        assert_eq!(found.supported_by(), "typescript");
        assert_eq!(found.evidence(), files);
    }

    #[tokio::test]
    async fn test_runtime_correlation_requires_usage() {
        let ctx = context(HashMap::new());
        let files = vec![PathBuf::from("/project/src/app.js")];
        let names = declared(&["react", "@types/react"]);
        let correlator = TypeCorrelator::new(&ctx, &files, &names);

        let used = correlator
            .correlate("@types/react", |runtime| async move {
                assert_eq!(runtime, "react");
                vec![PathBuf::from("/project/src/app.js")]
            })
            .await
            .unwrap();
        assert_eq!(
            used,
            Correlation::RuntimePackage {
                runtime: "react".into(),
                files: vec![PathBuf::from("/project/src/app.js")],
            }
        );

        let unused = correlator
            .correlate("@types/react", |_| async { Vec::new() })
            .await;
        assert!(unused.is_none());
    }

    #[tokio::test]
    async fn test_undeclared_runtime_is_not_scanned() {
        let ctx = context(HashMap::new());
        let names = declared(&["@types/lodash"]);
        let correlator = TypeCorrelator::new(&ctx, &[], &names);
        let queried = Cell::new(false);

        let found = correlator
            .correlate("@types/lodash", |_| {
                queried.set(true);
                async { Vec::new() }
            })
            .await;
        assert!(found.is_none());
        assert!(!queried.get());
    }

    #[tokio::test]
    async fn test_compiler_types_correlation() {
        let mut configs = HashMap::new();
        configs.insert(
            "tsconfig.json".to_string(),
            ConfigValue::Json(json!({"compilerOptions": {"types": ["jest"]}})),
        );
        let ctx = context(configs);
        let names = declared(&["@types/jest"]);
        let correlator = TypeCorrelator::new(&ctx, &[], &names);

        let found = correlator
            .correlate("@types/jest", |_| async { Vec::new() })
            .await
            .unwrap();
        assert_eq!(found.supported_by(), "tsconfig.json");
        assert_eq!(found.evidence(), vec![PathBuf::from("/project/tsconfig.json")]);
    }

    #[tokio::test]
    async fn test_peer_dependency_correlation() {
        let ctx = DependencyContext::new("/project", BTreeMap::new(), HashMap::new());
        let mut graph = PackageGraph::new();
        graph.add_requirement("react-redux", "@types/react-redux", DependencyType::Peer);
        graph.add_requirement("other", "@types/react-redux", DependencyType::Production);
        ctx.set_package_graph(graph);

        let names = declared(&["@types/react-redux"]);
        let correlator = TypeCorrelator::new(&ctx, &[], &names);
        let found = correlator
            .correlate("@types/react-redux", |_| async { Vec::new() })
            .await
            .unwrap();

        assert_eq!(found.supported_by(), "react-redux");
        assert_eq!(
            found.evidence(),
            vec![PathBuf::from("/project/node_modules/react-redux/package.json")]
        );
    }

    #[tokio::test]
    async fn test_non_type_package_has_no_correlation() {
        let ctx = context(HashMap::new());
        let declared = BTreeSet::new();
        let correlator = TypeCorrelator::new(&ctx, &[], &declared);
        assert!(correlator
            .correlate("react", |_| async { Vec::new() })
            .await
            .is_none());
    }
}
