//! Builds the per-run [`DependencyContext`].
//!
//! Every candidate file whose name looks like configuration is read and
//! parsed into a [`ConfigValue`]. Nothing here is fatal: unreadable files
//! are skipped and unparseable ones degrade to raw text, since even raw
//! text can still carry evidence of use.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use futures::stream::{self, StreamExt};
use regex::Regex;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::graph::PackageGraph;
use crate::parser::{Manifest, MANIFEST_FILE};

/// Key under which the project manifest is always stored.
pub const MANIFEST_KEY: &str = MANIFEST_FILE;

/// Concurrent config reads in flight while building a context.
const CONFIG_READ_CONCURRENCY: usize = 32;

/// Parsed content of one configuration file.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Structured content (JSON, or YAML converted to JSON).
    Json(Value),
    /// Content kept verbatim: script-like configs and parse failures.
    Text(String),
}

impl ConfigValue {
    /// Parses `content` the way the file's extension suggests.
    ///
    /// Script configs (`.js`, `.cjs`, `.mjs`, `.ts`) are never evaluated
    /// and stay as text. Everything else is tried as JSON (or YAML for
    /// `.yml`/`.yaml`) and falls back to text.
    ///
    /// ```
    /// use depsweep::context::ConfigValue;
    /// use std::path::Path;
    ///
    /// let v = ConfigValue::parse(Path::new(".babelrc"), r#"{"presets": ["@babel/env"]}"#);
    /// assert!(matches!(v, ConfigValue::Json(_)));
    ///
    /// let v = ConfigValue::parse(Path::new("jest.config.js"), "module.exports = {}");
    /// assert!(matches!(v, ConfigValue::Text(_)));
    /// ```
    pub fn parse(path: &Path, content: &str) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "js" | "cjs" | "mjs" | "ts" | "cts" | "mts" => ConfigValue::Text(content.to_string()),
            "yml" | "yaml" => match serde_yaml::from_str::<Value>(content) {
                Ok(value) => ConfigValue::Json(value),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "yaml config kept as text");
                    ConfigValue::Text(content.to_string())
                }
            },
            _ => match serde_json::from_str::<Value>(content) {
                Ok(value) => ConfigValue::Json(value),
                Err(_) => ConfigValue::Text(content.to_string()),
            },
        }
    }
}

/// Immutable per-analysis bundle consumed by the usage matcher.
#[derive(Debug)]
pub struct DependencyContext {
    project_root: PathBuf,
    manifest_path: PathBuf,
    scripts: BTreeMap<String, String>,
    configs: HashMap<String, ConfigValue>,
    dependency_graph: OnceCell<Arc<PackageGraph>>,
}

impl DependencyContext {
    /// Creates a context from already-parsed parts.
    pub fn new(
        project_root: impl Into<PathBuf>,
        scripts: BTreeMap<String, String>,
        configs: HashMap<String, ConfigValue>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            manifest_path: project_root.join(MANIFEST_FILE),
            project_root,
            scripts,
            configs,
            dependency_graph: OnceCell::new(),
        }
    }

    /// Absolute project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Path of the project manifest.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Script name to command line mapping.
    pub fn scripts(&self) -> &BTreeMap<String, String> {
        &self.scripts
    }

    /// All parsed configuration files, keyed by root-relative path.
    pub fn configs(&self) -> &HashMap<String, ConfigValue> {
        &self.configs
    }

    /// The manifest's parsed content.
    pub fn manifest(&self) -> Option<&ConfigValue> {
        self.configs.get(MANIFEST_KEY)
    }

    /// True if `path` is the project manifest.
    pub fn is_manifest(&self, path: &Path) -> bool {
        path == self.manifest_path
    }

    /// Parsed configuration for `path`, if it was recognised as one.
    pub fn config_for(&self, path: &Path) -> Option<&ConfigValue> {
        relative_key(&self.project_root, path).and_then(|key| self.configs.get(&key))
    }

    /// The installed-package graph, built on first use and shared after.
    pub async fn package_graph(&self) -> Arc<PackageGraph> {
        self.dependency_graph
            .get_or_init(|| async { Arc::new(PackageGraph::load(&self.project_root).await) })
            .await
            .clone()
    }

    /// Installs a pre-built graph. Returns false if one was already set.
    pub fn set_package_graph(&self, graph: PackageGraph) -> bool {
        self.dependency_graph.set(Arc::new(graph)).is_ok()
    }
}

/// Builds a [`DependencyContext`] from the manifest and the file corpus.
pub struct ContextBuilder<'a> {
    project_root: &'a Path,
    manifest: &'a Manifest,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(project_root: &'a Path, manifest: &'a Manifest) -> Self {
        Self {
            project_root,
            manifest,
        }
    }

    /// Reads and parses every configuration file in `files`.
    pub async fn build(&self, files: &[PathBuf]) -> DependencyContext {
        let scripts: BTreeMap<String, String> = self
            .manifest
            .scripts()
            .map(|(name, cmd)| (name.to_string(), cmd.to_string()))
            .collect();

        let candidates: Vec<(String, PathBuf)> = files
            .iter()
            .filter(|path| is_config_file(path))
            .filter_map(|path| {
                let key = relative_key(self.project_root, path)?;
                (key != MANIFEST_KEY).then(|| (key, path.clone()))
            })
            .collect();

        let mut configs: HashMap<String, ConfigValue> = stream::iter(candidates)
            .map(|(key, path)| async move {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => {
                        let content = String::from_utf8_lossy(&bytes);
                        Some((key, ConfigValue::parse(&path, &content)))
                    }
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "skipping unreadable config");
                        None
                    }
                }
            })
            .buffer_unordered(CONFIG_READ_CONCURRENCY)
            .filter_map(|entry| async move { entry })
            .collect()
            .await;

        configs.insert(
            MANIFEST_KEY.to_string(),
            ConfigValue::Json(self.manifest.document.clone()),
        );

        debug!(configs = configs.len(), scripts = scripts.len(), "context built");
        DependencyContext::new(self.project_root, scripts, configs)
    }
}

fn rc_suffix_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\.(config|rc)\.[a-z0-9]+$").expect("hardcoded regex is valid"))
}

/// Name heuristics for configuration files.
///
/// ```
/// use depsweep::context::is_config_file;
/// use std::path::Path;
///
/// assert!(is_config_file(Path::new("/p/webpack.config.js")));
/// assert!(is_config_file(Path::new("/p/.eslintrc")));
/// assert!(is_config_file(Path::new("/p/package.json")));
/// assert!(is_config_file(Path::new("/p/lint.rc.json")));
/// assert!(!is_config_file(Path::new("/p/src/index.ts")));
/// ```
pub fn is_config_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_ascii_lowercase();

    name.contains("config")
        || name.starts_with('.')
        || name == MANIFEST_FILE
        || rc_suffix_regex().is_match(&name)
}

/// Root-relative, `/`-separated key for `path`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_manifest;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_config_value_yaml() {
        let v = ConfigValue::parse(Path::new(".eslintrc.yml"), "extends:\n  - airbnb\n");
        match v {
            ConfigValue::Json(value) => assert_eq!(value["extends"][0], "airbnb"),
            other => panic!("expected json, got {:?}", other),
        }
    }

    #[test]
    fn test_config_value_bad_json_degrades() {
        let v = ConfigValue::parse(Path::new(".babelrc"), "{ presets: [");
        assert_eq!(v, ConfigValue::Text("{ presets: [".to_string()));
    }

    #[test]
    fn test_relative_key() {
        let root = Path::new("/project");
        assert_eq!(
            relative_key(root, Path::new("/project/config/jest.config.js")),
            Some("config/jest.config.js".to_string())
        );
        assert_eq!(relative_key(root, Path::new("/elsewhere/a.js")), None);
        assert_eq!(relative_key(root, root), None);
    }

    #[test]
    fn test_is_config_file_negatives() {
        assert!(!is_config_file(Path::new("src/app.tsx")));
        assert!(!is_config_file(Path::new("README.md")));
    }

    #[tokio::test]
    async fn test_build_collects_configs_and_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let manifest_path = write(
            root,
            "package.json",
            r#"{"name": "app", "scripts": {"test": "jest"}, "prettier": "@acme/prettier-config"}"#,
        );
        let babelrc = write(root, ".babelrc", r#"{"presets": ["@babel/preset-env"]}"#);
        let jest = write(root, "jest.config.js", "module.exports = { preset: 'ts-jest' };");
        let source = write(root, "src/index.js", "console.log('hi')");

        let manifest = read_manifest(&manifest_path).unwrap();
        let ctx = ContextBuilder::new(root, &manifest)
            .build(&[manifest_path.clone(), babelrc.clone(), jest.clone(), source.clone()])
            .await;

        assert_eq!(ctx.scripts().get("test").map(String::as_str), Some("jest"));
        assert!(ctx.is_manifest(&manifest_path));
        assert!(matches!(ctx.manifest(), Some(ConfigValue::Json(_))));
        assert!(matches!(ctx.config_for(&babelrc), Some(ConfigValue::Json(_))));
        assert!(matches!(ctx.config_for(&jest), Some(ConfigValue::Text(_))));
        assert!(ctx.config_for(&source).is_none());
    }

    #[tokio::test]
    async fn test_non_utf8_config_degrades_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let manifest_path = write(root, "package.json", r#"{"name": "app"}"#);
        let eslintrc = root.join(".eslintrc");
        fs::write(&eslintrc, b"// \xff\xfe legacy\n{\"plugins\": [\"react\"]}\n").unwrap();

        let manifest = read_manifest(&manifest_path).unwrap();
        let ctx = ContextBuilder::new(root, &manifest)
            .build(&[manifest_path, eslintrc.clone()])
            .await;

        match ctx.config_for(&eslintrc) {
            Some(ConfigValue::Text(text)) => assert!(text.contains("\"plugins\": [\"react\"]")),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_package_graph_is_built_once() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DependencyContext::new(dir.path(), BTreeMap::new(), HashMap::new());
        let first = ctx.package_graph().await;
        let second = ctx.package_graph().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!ctx.set_package_graph(PackageGraph::new()));
    }
}
