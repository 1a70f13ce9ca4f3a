//! Orchestrates one analysis run.
//!
//! The [`Analyzer`] reads the manifest, builds the context, scans the
//! corpus once per declared dependency, folds in the installed-package
//! graph and type-package rules, and hands the records to the resolver.
//!
//! # Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use depsweep::config::AnalyzerOptions;
//! use depsweep::engine::Analyzer;
//!
//! # async fn run(files: Vec<PathBuf>) -> Result<(), depsweep::engine::AnalysisError> {
//! let analyzer = Analyzer::new(AnalyzerOptions::default());
//! let report = analyzer.analyze(Path::new("/work/app"), &files).await?;
//! for name in &report.unused {
//!     println!("unused: {name}");
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod report;

pub use cache::{AnalysisCache, CacheKey, DependencyInfo};
pub use report::{AnalysisReport, RetainReason, RetainedDependency, ScanWarnings};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

use crate::analysis::type_packages::is_type_package;
use crate::analysis::{
    DependencyMatcher, MemoryProbe, ScanOutcome, ScanProgress, ScanScheduler, SystemMemory,
    TypeCorrelator,
};
use crate::config::{load_options, AnalyzerOptions, ConfigError, PROTECTED_DEPENDENCIES};
use crate::context::{ContextBuilder, DependencyContext};
use crate::graph::PackageGraph;
use crate::parser::{
    extract_dependencies, read_manifest, DependencyType, Manifest, ParseError, MANIFEST_FILE,
};
use crate::resolver::resolve_unused;

/// Failures that abort a run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Cannot analyze {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Reads the project manifest under `root`.
pub fn load_manifest(root: &Path) -> Result<Manifest, AnalysisError> {
    let path = root.join(MANIFEST_FILE);
    read_manifest(&path).map_err(|source| AnalysisError::Manifest { path, source })
}

/// Reads the manifest and the tool options that go with it.
pub fn load_project(root: &Path) -> Result<(Manifest, AnalyzerOptions), AnalysisError> {
    let manifest = load_manifest(root)?;
    let options = load_options(root, &manifest.document)?;
    Ok((manifest, options))
}

/// Ordering key: case-insensitive, ignoring a leading scope `@`.
///
/// ```
/// use depsweep::engine::sort_key;
///
/// let mut names = vec!["react", "@babel/core", "Lodash", "axios"];
/// names.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
/// assert_eq!(names, vec!["axios", "@babel/core", "Lodash", "react"]);
/// ```
pub fn sort_key(name: &str) -> (String, &str) {
    (name.trim_start_matches('@').to_lowercase(), name)
}

/// Everything the per-dependency steps share within one run.
struct RunState<'a> {
    root: &'a Path,
    ctx: &'a DependencyContext,
    corpus: &'a [PathBuf],
    declared: &'a BTreeSet<String>,
    graph: &'a PackageGraph,
    cache: &'a AnalysisCache,
}

/// Runs analyses, caching per-dependency results within each run.
#[derive(Debug, Clone)]
pub struct Analyzer {
    options: AnalyzerOptions,
    shared_cache: Option<AnalysisCache>,
    scheduler: ScanScheduler,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        let scheduler = ScanScheduler::new(options.batch, Arc::new(SystemMemory));
        Self {
            options,
            shared_cache: None,
            scheduler,
        }
    }

    /// Uses `cache` for every run instead of a fresh one per run.
    ///
    /// The caller owns its lifetime and must clear it when the project
    /// changes on disk.
    pub fn with_cache(mut self, cache: AnalysisCache) -> Self {
        self.shared_cache = Some(cache);
        self
    }

    /// Sizes scan batches from `probe` instead of system memory.
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.scheduler = ScanScheduler::new(self.options.batch, probe);
        self
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Analyzes the project at `root` over the candidate `files`.
    pub async fn analyze(
        &self,
        root: &Path,
        files: &[PathBuf],
    ) -> Result<AnalysisReport, AnalysisError> {
        self.analyze_with_progress(root, files, |_| {}).await
    }

    /// Like [`analyze`](Self::analyze), reporting scan progress per dependency.
    pub async fn analyze_with_progress<F>(
        &self,
        root: &Path,
        files: &[PathBuf],
        mut on_progress: F,
    ) -> Result<AnalysisReport, AnalysisError>
    where
        F: FnMut(ScanProgress<'_>),
    {
        let manifest = load_manifest(root)?;
        let declared = manifest.package.dependency_names();
        let kinds = declared_kinds(&manifest);

        let mut corpus = files.to_vec();
        if !corpus.contains(&manifest.path) {
            corpus.push(manifest.path.clone());
        }

        let ctx = ContextBuilder::new(root, &manifest).build(&corpus).await;
        let graph = ctx.package_graph().await;
        let cache = self.shared_cache.clone().unwrap_or_default();
        let state = RunState {
            root,
            ctx: &ctx,
            corpus: &corpus,
            declared: &declared,
            graph: &graph,
            cache: &cache,
        };

        let mut order: Vec<&String> = declared.iter().collect();
        order.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

        let mut infos: BTreeMap<String, Arc<DependencyInfo>> = BTreeMap::new();
        for name in &order {
            let span = info_span!("dependency", name = %name);
            let info = self
                .dependency_info(&state, name, &mut on_progress)
                .instrument(span)
                .await;
            infos.insert(name.to_string(), info);
        }

        let resolution = resolve_unused(&infos);
        let mut report = AnalysisReport {
            project_root: root.to_path_buf(),
            analyzed: declared.len(),
            passes: resolution.passes,
            ..Default::default()
        };

        for name in &order {
            if !resolution.unused.contains(*name) {
                continue;
            }
            match self.retain_reason(name, kinds.get(name.as_str()).copied()) {
                Some(reason) => report.retained.push(RetainedDependency {
                    name: name.to_string(),
                    reason,
                }),
                None => report.unused.push(name.to_string()),
            }
        }

        let failed: BTreeSet<PathBuf> = order
            .iter()
            .filter_map(|name| cache.usage(&CacheKey::new(root, name.as_str())))
            .flat_map(|usage| usage.failed.clone())
            .collect();

        for (name, info) in &infos {
            if info.is_directly_used() {
                report
                    .evidence
                    .insert(name.clone(), info.used_in_files.clone());
            }
            if !info.required_by_packages.is_empty() {
                report
                    .required_by
                    .insert(name.clone(), info.required_by_packages.clone());
            }
            if let Some(source) = &info.supported_by {
                report.supported_by.insert(name.clone(), source.clone());
            }
            if info.has_sub_dependency_usage {
                report.sub_dependency_usage.insert(name.clone());
            }
        }

        report.warnings = ScanWarnings {
            file_errors: failed.len(),
            skipped_packages: graph.skipped_packages(),
        };

        info!(
            analyzed = report.analyzed,
            unused = report.unused.len(),
            retained = report.retained.len(),
            passes = report.passes,
            "analysis complete"
        );
        Ok(report)
    }

    fn retain_reason(&self, name: &str, kind: Option<DependencyType>) -> Option<RetainReason> {
        if self.options.is_safe(name) {
            return Some(RetainReason::Safe);
        }
        if self.options.aggressive {
            return None;
        }
        match kind {
            Some(DependencyType::Peer) => Some(RetainReason::Peer),
            Some(DependencyType::Optional) => Some(RetainReason::Optional),
            _ if PROTECTED_DEPENDENCIES.contains(&name) => Some(RetainReason::Protected),
            _ => None,
        }
    }

    async fn dependency_info<F>(
        &self,
        state: &RunState<'_>,
        name: &str,
        on_progress: &mut F,
    ) -> Arc<DependencyInfo>
    where
        F: FnMut(ScanProgress<'_>),
    {
        let key = CacheKey::new(state.root, name);
        if let Some(info) = state.cache.info(&key) {
            debug!("cached");
            let total = state.corpus.len();
            on_progress(ScanProgress {
                dependency: name,
                processed: total,
                total,
            });
            return info;
        }

        let direct = self.direct_usage(state, name, on_progress).await;
        let mut info = DependencyInfo {
            used_in_files: direct.files.clone(),
            required_by_packages: state.graph.required_by(name, state.declared),
            ..Default::default()
        };

        if is_type_package(name) {
            if !info.is_directly_used() {
                let correlator = TypeCorrelator::new(state.ctx, state.corpus, state.declared);
                let correlation = correlator
                    .correlate(name, |runtime| async move {
                        self.direct_usage(state, &runtime, &mut ignore_progress)
                            .await
                            .files
                            .clone()
                    })
                    .await;
                if let Some(correlation) = correlation {
                    debug!(supported_by = %correlation.supported_by(), "type package correlated");
                    info.used_in_files = correlation.evidence();
                    info.supported_by = Some(correlation.supported_by());
                }
            }
        } else {
            info.has_sub_dependency_usage = self.sub_dependency_usage(state, name).await;
        }

        state.cache.insert_info(key, info)
    }

    /// True if a package that `name` itself requires is used directly,
    /// whether or not the project declares it.
    async fn sub_dependency_usage(&self, state: &RunState<'_>, name: &str) -> bool {
        let requirements: Vec<String> = state
            .graph
            .requirements_of(name)
            .into_iter()
            .filter(|req| *req != name)
            .map(str::to_string)
            .collect();

        for requirement in requirements {
            let usage = self.direct_usage(state, &requirement, &mut ignore_progress).await;
            if usage.is_used() {
                return true;
            }
        }
        false
    }

    async fn direct_usage<F>(
        &self,
        state: &RunState<'_>,
        name: &str,
        on_progress: &mut F,
    ) -> Arc<ScanOutcome>
    where
        F: FnMut(ScanProgress<'_>),
    {
        let key = CacheKey::new(state.root, name);
        if let Some(usage) = state.cache.usage(&key) {
            let total = state.corpus.len();
            on_progress(ScanProgress {
                dependency: name,
                processed: total,
                total,
            });
            return usage;
        }

        let matcher = DependencyMatcher::new(name);
        let outcome = self
            .scheduler
            .scan(state.corpus, &matcher, state.ctx, &mut *on_progress)
            .await;
        state.cache.insert_usage(key, outcome)
    }
}

/// Auxiliary scans (runtime packages, sub-dependencies) report nothing.
fn ignore_progress(_: ScanProgress<'_>) {}

/// Declared section per dependency. Peer and optional declarations take
/// precedence when a name appears in several sections.
fn declared_kinds(manifest: &Manifest) -> HashMap<String, DependencyType> {
    let mut kinds = HashMap::new();
    for dep in extract_dependencies(&manifest.package) {
        kinds
            .entry(dep.name)
            .and_modify(|kind: &mut DependencyType| {
                if dep.dep_type.is_protected() {
                    *kind = dep.dep_type;
                }
            })
            .or_insert(dep.dep_type);
    }
    kinds
}
