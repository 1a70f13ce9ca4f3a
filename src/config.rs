//! Tool configuration.
//!
//! Options come from an optional `depsweep.json` next to the manifest, or
//! from a `"depsweep"` key inside the manifest itself. The file wins when
//! both exist. Command-line flags are layered on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Standalone configuration file name.
pub const CONFIG_FILE: &str = "depsweep.json";

/// Key under which options may be embedded in package.json.
pub const MANIFEST_CONFIG_KEY: &str = "depsweep";

/// Dependencies that are retained unless running in aggressive mode.
/// Both are consumed by the compiler toolchain rather than imported.
pub const PROTECTED_DEPENDENCIES: &[&str] = &["typescript", "tslib"];

/// Errors raised while loading tool configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Bounds for the scan scheduler's batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchLimits {
    /// Smallest batch ever scheduled.
    pub min: usize,
    /// Largest batch ever scheduled.
    pub max: usize,
    /// Assumed peak memory cost of one batch.
    pub bytes_per_batch: u64,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            min: 10,
            max: 100,
            bytes_per_batch: 50 * 1024 * 1024,
        }
    }
}

impl BatchLimits {
    /// Batch size for the given memory headroom, clamped to `[min, max]`.
    ///
    /// Unknown headroom schedules the largest batch.
    ///
    /// ```
    /// use depsweep::config::BatchLimits;
    ///
    /// let limits = BatchLimits::default();
    /// assert_eq!(limits.batch_size(None), 100);
    /// assert_eq!(limits.batch_size(Some(0)), 10);
    /// assert_eq!(limits.batch_size(Some(20 * 50 * 1024 * 1024)), 20);
    /// ```
    pub fn batch_size(&self, available_bytes: Option<u64>) -> usize {
        let min = self.min.max(1);
        let max = self.max.max(min);
        match available_bytes {
            None => max,
            Some(bytes) => {
                let per_batch = self.bytes_per_batch.max(1);
                let fits = usize::try_from(bytes / per_batch).unwrap_or(usize::MAX);
                fits.clamp(min, max)
            }
        }
    }
}

/// Options that shape the engine's output and scheduling.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerOptions {
    /// Dependencies never reported as removable.
    pub safe: Vec<String>,
    /// Also propose peer, optional and protected dependencies for removal.
    pub aggressive: bool,
    /// Scan batch sizing.
    pub batch: BatchLimits,
    /// Extra directory names skipped during file discovery.
    pub ignore_dirs: Vec<String>,
}

impl AnalyzerOptions {
    /// True if `name` is on the user's safe list.
    pub fn is_safe(&self, name: &str) -> bool {
        self.safe.iter().any(|s| s == name)
    }

    /// Merges command-line overrides into file-based options.
    pub fn with_overrides(mut self, safe: &[String], aggressive: bool) -> Self {
        for name in safe {
            if !self.is_safe(name) {
                self.safe.push(name.clone());
            }
        }
        self.aggressive |= aggressive;
        self
    }
}

/// Loads options for a project.
///
/// Looks for [`CONFIG_FILE`] under `root` first, then for the
/// [`MANIFEST_CONFIG_KEY`] object in the manifest document. Returns the
/// defaults when neither is present.
pub fn load_options(root: &Path, manifest: &Value) -> Result<AnalyzerOptions, ConfigError> {
    let path = root.join(CONFIG_FILE);
    if path.is_file() {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        return serde_json::from_str(&content).map_err(|source| ConfigError::Invalid { path, source });
    }

    match manifest.get(MANIFEST_CONFIG_KEY) {
        Some(embedded) => {
            serde_json::from_value(embedded.clone()).map_err(|source| ConfigError::Invalid {
                path: root.join(crate::parser::MANIFEST_FILE),
                source,
            })
        }
        None => Ok(AnalyzerOptions::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_size_bounds() {
        let limits = BatchLimits::default();
        assert_eq!(limits.batch_size(Some(u64::MAX)), 100);
        assert_eq!(limits.batch_size(Some(1024)), 10);
        assert_eq!(limits.batch_size(Some(limits.bytes_per_batch * 42)), 42);
    }

    #[test]
    fn test_batch_size_degenerate_limits() {
        let limits = BatchLimits {
            min: 0,
            max: 0,
            bytes_per_batch: 0,
        };
        assert_eq!(limits.batch_size(Some(0)), 1);
        assert_eq!(limits.batch_size(None), 1);
    }

    #[test]
    fn test_load_options_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let options = load_options(dir.path(), &json!({"name": "app"})).unwrap();
        assert!(options.safe.is_empty());
        assert!(!options.aggressive);
        assert_eq!(options.batch, BatchLimits::default());
    }

    #[test]
    fn test_load_options_from_manifest_key() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = json!({
            "name": "app",
            "depsweep": {"safe": ["husky"], "batch": {"max": 40}}
        });
        let options = load_options(dir.path(), &manifest).unwrap();
        assert!(options.is_safe("husky"));
        assert_eq!(options.batch.max, 40);
        assert_eq!(options.batch.min, 10);
    }

    #[test]
    fn test_load_options_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"aggressive": true}"#).unwrap();
        let manifest = json!({"depsweep": {"safe": ["husky"]}});
        let options = load_options(dir.path(), &manifest).unwrap();
        assert!(options.aggressive);
        assert!(!options.is_safe("husky"));
    }

    #[test]
    fn test_load_options_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ nope").unwrap();
        let err = load_options(dir.path(), &json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_with_overrides() {
        let options = AnalyzerOptions {
            safe: vec!["a".to_string()],
            ..Default::default()
        }
        .with_overrides(&["a".to_string(), "b".to_string()], true);
        assert_eq!(options.safe, vec!["a".to_string(), "b".to_string()]);
        assert!(options.aggressive);
    }
}
