//! The engine's output.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Why an otherwise unused dependency is not proposed for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetainReason {
    /// On the user's safe list.
    Safe,
    /// Declared as a peer dependency.
    Peer,
    /// Declared as an optional dependency.
    Optional,
    /// Needed by tooling without ever being referenced (`typescript`, `tslib`).
    Protected,
}

impl fmt::Display for RetainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RetainReason::Safe => "safe list",
            RetainReason::Peer => "peer dependency",
            RetainReason::Optional => "optional dependency",
            RetainReason::Protected => "protected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetainedDependency {
    pub name: String,
    pub reason: RetainReason,
}

/// Recoverable problems met during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanWarnings {
    /// Distinct files that could not be read.
    pub file_errors: usize,
    /// Installed manifests skipped while building the package graph.
    pub skipped_packages: usize,
}

impl ScanWarnings {
    pub fn is_empty(&self) -> bool {
        self.file_errors == 0 && self.skipped_packages == 0
    }
}

/// Result of analyzing one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub project_root: PathBuf,
    /// Number of declared dependencies analyzed.
    pub analyzed: usize,
    /// Dependencies proposed for removal, in display order.
    pub unused: Vec<String>,
    /// Unused dependencies kept back by options or protection rules.
    pub retained: Vec<RetainedDependency>,
    /// Files proving use, per used dependency.
    pub evidence: BTreeMap<String, Vec<PathBuf>>,
    /// Top-level requirers, per dependency that has any.
    pub required_by: BTreeMap<String, BTreeSet<String>>,
    /// Correlation source, per type package resolved through one.
    pub supported_by: BTreeMap<String, String>,
    /// Dependencies whose own dependencies are used directly.
    pub sub_dependency_usage: BTreeSet<String>,
    /// Closure passes the resolver needed.
    pub passes: usize,
    pub warnings: ScanWarnings,
}

impl AnalysisReport {
    pub fn has_unused(&self) -> bool {
        !self.unused.is_empty()
    }

    /// Number of dependencies with direct evidence of use.
    pub fn used_count(&self) -> usize {
        self.evidence.len()
    }
}
