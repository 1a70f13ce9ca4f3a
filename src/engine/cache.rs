//! Per-run memoization of scan results and dependency records.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::analysis::ScanOutcome;

/// Identity of a cached computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub project_root: PathBuf,
    pub dependency: String,
}

impl CacheKey {
    pub fn new(project_root: impl Into<PathBuf>, dependency: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            dependency: dependency.into(),
        }
    }
}

/// Everything learned about one declared dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyInfo {
    /// Files providing direct evidence, in corpus order.
    pub used_in_files: Vec<PathBuf>,
    /// Top-level dependencies that transitively require this one.
    pub required_by_packages: BTreeSet<String>,
    /// A package this one declares is itself declared and directly used.
    pub has_sub_dependency_usage: bool,
    /// Source of a type-package correlation, when one applied.
    pub supported_by: Option<String>,
}

impl DependencyInfo {
    pub fn is_directly_used(&self) -> bool {
        !self.used_in_files.is_empty()
    }
}

#[derive(Debug, Default)]
struct CacheMaps {
    usage: HashMap<CacheKey, Arc<ScanOutcome>>,
    info: HashMap<CacheKey, Arc<DependencyInfo>>,
}

/// Shared handle to cached results.
///
/// Clones share storage. Entries are immutable once written: inserting
/// under an existing key keeps and returns the first value.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    inner: Arc<Mutex<CacheMaps>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn maps(&self) -> MutexGuard<'_, CacheMaps> {
        // Entries are written whole, so a poisoned map is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached direct-usage scan for `key`.
    pub fn usage(&self, key: &CacheKey) -> Option<Arc<ScanOutcome>> {
        self.maps().usage.get(key).cloned()
    }

    /// Stores a direct-usage scan, returning the cached entry.
    pub fn insert_usage(&self, key: CacheKey, outcome: ScanOutcome) -> Arc<ScanOutcome> {
        self.maps()
            .usage
            .entry(key)
            .or_insert_with(|| Arc::new(outcome))
            .clone()
    }

    /// Cached dependency record for `key`.
    pub fn info(&self, key: &CacheKey) -> Option<Arc<DependencyInfo>> {
        self.maps().info.get(key).cloned()
    }

    /// Stores a dependency record, returning the cached entry.
    pub fn insert_info(&self, key: CacheKey, info: DependencyInfo) -> Arc<DependencyInfo> {
        self.maps()
            .info
            .entry(key)
            .or_insert_with(|| Arc::new(info))
            .clone()
    }

    /// Number of cached dependency records.
    pub fn len(&self) -> usize {
        self.maps().info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry, for reuse after the filesystem changed.
    pub fn clear(&self) {
        let mut maps = self.maps();
        maps.usage.clear();
        maps.info.clear();
    }
}
