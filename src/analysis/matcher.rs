//! Decides whether one file is evidence that a dependency is used.
//!
//! Signals are tried in a fixed order and the first positive wins:
//!
//! 1. deep scan of the project manifest's values
//! 2. deep scan of a parsed configuration file (substring search for raw text)
//! 3. exact script tokens (attributed to the manifest)
//! 4. binary files stop here
//! 5. `import('...')` found textually
//! 6. syntax-tree imports
//! 7. whole-word mention, for members of a known tool family

use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::imports::{extract_imports, package_name, SourceLanguage};
use super::patterns::{family_for, word_regex, UsagePatterns};
use super::type_packages::{is_type_package, runtime_package};
use crate::config::{CONFIG_FILE, MANIFEST_CONFIG_KEY};
use crate::context::{ConfigValue, DependencyContext};
use crate::parser::MANIFEST_FILE;

/// Bytes inspected when sniffing for binary content.
const BINARY_SNIFF_LEN: usize = 8000;

/// Lockfiles list every installed package and prove nothing about use.
const LOCKFILES: &[&str] = &[
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
];

/// Per-file failures. Parse failures are not errors; they yield no evidence.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Usage matcher for a single dependency.
///
/// Patterns and regexes are compiled once and reused for every file.
#[derive(Debug, Clone)]
pub struct DependencyMatcher {
    dependency: String,
    /// Name compared against import sources.
    import_target: String,
    patterns: UsagePatterns,
    dynamic_import: Regex,
    family_word: Option<Regex>,
}

impl DependencyMatcher {
    pub fn new(dependency: &str) -> Self {
        // Type packages are never imported by their own name.
        let import_target = runtime_package(dependency).unwrap_or_else(|| dependency.to_string());
        let dynamic_import = Regex::new(&format!(
            r#"import\(\s*['"`]{}(?:/[^'"`]*)?['"`]"#,
            regex::escape(&import_target)
        ))
        .expect("escaped dynamic import pattern is valid");

        Self {
            dependency: dependency.to_string(),
            patterns: UsagePatterns::for_dependency(dependency),
            family_word: family_for(dependency).map(|_| word_regex(dependency)),
            import_target,
            dynamic_import,
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// True if `file` is evidence of use.
    pub async fn is_used(&self, file: &Path, ctx: &DependencyContext) -> Result<bool, MatchError> {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if LOCKFILES.contains(&name) || name == CONFIG_FILE {
            return Ok(false);
        }

        let is_manifest = ctx.is_manifest(file);
        if is_manifest {
            if let Some(ConfigValue::Json(document)) = ctx.manifest() {
                if self.matches_manifest(document) {
                    return Ok(true);
                }
            }
        } else if let Some(config) = ctx.config_for(file) {
            if self.matches_config(config) {
                return Ok(true);
            }
        }

        if is_manifest && self.matches_scripts(ctx) {
            return Ok(true);
        }

        // Dependency sections name every dependency; only values scanned
        // above count for manifests.
        if name == MANIFEST_FILE {
            return Ok(false);
        }

        let bytes = tokio::fs::read(file).await.map_err(|source| MatchError::Read {
            path: file.to_path_buf(),
            source,
        })?;
        if is_binary(&bytes) {
            return Ok(false);
        }

        let text = String::from_utf8_lossy(&bytes);
        Ok(self.matches_source(file, &text))
    }

    /// Signals 5 to 7 against already-read file text.
    pub fn matches_source(&self, path: &Path, text: &str) -> bool {
        if self.dynamic_import.is_match(text) {
            return true;
        }

        if let Some(language) = SourceLanguage::from_path(path) {
            match extract_imports(text, language) {
                Ok(imports) => {
                    if imports.iter().any(|site| self.matches_import(&site.source)) {
                        return true;
                    }
                }
                Err(e) => debug!(path = %path.display(), error = %e, "import extraction failed"),
            }
        }

        self.family_word
            .as_ref()
            .is_some_and(|word| word.is_match(text))
    }

    /// Normalization-aware comparison of an import source.
    ///
    /// ```
    /// use depsweep::analysis::DependencyMatcher;
    ///
    /// let matcher = DependencyMatcher::new("@tanstack/react-query");
    /// assert!(matcher.matches_import("@tanstack/react-query/devtools"));
    ///
    /// let types = DependencyMatcher::new("@types/lodash");
    /// assert!(types.matches_import("lodash/debounce"));
    /// assert!(!types.matches_import("@types/lodash"));
    /// ```
    pub fn matches_import(&self, source: &str) -> bool {
        let target = self.import_target.as_str();
        if source == target {
            return true;
        }
        let Some(package) = package_name(source) else {
            return false;
        };
        if package == target {
            return true;
        }
        // Type packages only match their runtime name.
        if is_type_package(&self.dependency) {
            return false;
        }
        package
            .strip_prefix('@')
            .and_then(|scoped| scoped.split_once('/'))
            .is_some_and(|(scope, unscoped)| scope != "types" && unscoped == target)
    }

    /// Deep scan of the manifest, leaving out this tool's own settings.
    pub fn matches_manifest(&self, document: &Value) -> bool {
        match document.as_object() {
            Some(fields) => fields
                .iter()
                .filter(|(key, _)| key.as_str() != MANIFEST_CONFIG_KEY)
                .any(|(_, value)| self.patterns.matches_value(value)),
            None => self.patterns.matches_value(document),
        }
    }

    /// Deep scan of a parsed configuration file.
    pub fn matches_config(&self, config: &ConfigValue) -> bool {
        match config {
            ConfigValue::Json(value) => self.patterns.matches_value(value),
            ConfigValue::Text(text) => text.contains(&self.dependency),
        }
    }

    /// True if any script command has a token equal to the dependency.
    pub fn matches_scripts(&self, ctx: &DependencyContext) -> bool {
        ctx.scripts()
            .values()
            .any(|command| command.split_whitespace().any(|token| token == self.dependency))
    }
}

/// True if the leading bytes contain a NUL.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

/// One-off check of `file` for `dependency`. Failures count as no evidence.
pub async fn is_used(dependency: &str, file: &Path, ctx: &DependencyContext) -> bool {
    match DependencyMatcher::new(dependency).is_used(file, ctx).await {
        Ok(used) => used,
        Err(e) => {
            debug!(error = %e, "treating unreadable file as no evidence");
            false
        }
    }
}
