//! Usage analysis for declared dependencies.
//!
//! - [`patterns`]: recall-oriented name patterns and tool families
//! - [`imports`]: syntax-tree import extraction for JavaScript/TypeScript
//! - [`matcher`]: the per-file usage decision
//! - [`scanner`]: batched scanning of the whole corpus
//! - [`type_packages`]: rules for `@types/*` packages
//!
//! # Example
//!
//! ```ignore
//! use depsweep::analysis::{scan, DependencyMatcher};
//!
//! let matcher = DependencyMatcher::new("lodash");
//! let used = matcher.is_used(Path::new("src/index.js"), &ctx).await?;
//!
//! let outcome = scan(&files, "lodash", &ctx, |p| {
//!     eprintln!("{}: {}/{}", p.dependency, p.processed, p.total);
//! })
//! .await;
//! ```

pub mod imports;
pub mod matcher;
pub mod patterns;
pub mod scanner;
pub mod type_packages;

pub use imports::{extract_imports, ImportError, ImportKind, ImportSite, SourceLanguage};
pub use matcher::{is_used, DependencyMatcher, MatchError};
pub use patterns::{family_for, PatternFamily, UsagePatterns, PATTERN_FAMILIES};
pub use scanner::{
    scan, FixedMemory, MemoryProbe, ScanOutcome, ScanProgress, ScanScheduler, SystemMemory,
};
pub use type_packages::{runtime_package, Correlation, TypeCorrelator, NODE_TYPES, TYPES_SCOPE};
