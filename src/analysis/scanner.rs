//! Memory-aware batched scanning of the file corpus for one dependency.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::matcher::DependencyMatcher;
use crate::config::BatchLimits;
use crate::context::DependencyContext;

/// Source of the memory headroom used to size batches.
pub trait MemoryProbe: Send + Sync + fmt::Debug {
    /// Available memory in bytes, or `None` when it cannot be determined.
    fn available_bytes(&self) -> Option<u64>;
}

/// Reads `MemAvailable` from `/proc/meminfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    fn available_bytes(&self) -> Option<u64> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&meminfo)
    }
}

/// A fixed answer, for tests and constrained environments.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub Option<u64>);

impl MemoryProbe for FixedMemory {
    fn available_bytes(&self) -> Option<u64> {
        self.0
    }
}

fn parse_mem_available(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    kib.checked_mul(1024)
}

/// Progress of one dependency's scan, reported after every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress<'a> {
    pub dependency: &'a str,
    pub processed: usize,
    pub total: usize,
}

/// Result of scanning the corpus for one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Files with evidence of use, in corpus order.
    pub files: Vec<PathBuf>,
    /// Files that could not be read.
    pub failed: Vec<PathBuf>,
}

impl ScanOutcome {
    pub fn is_used(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Runs a matcher over the corpus in sequential batches.
#[derive(Debug, Clone)]
pub struct ScanScheduler {
    limits: BatchLimits,
    probe: Arc<dyn MemoryProbe>,
}

impl Default for ScanScheduler {
    fn default() -> Self {
        Self::new(BatchLimits::default(), Arc::new(SystemMemory))
    }
}

impl ScanScheduler {
    pub fn new(limits: BatchLimits, probe: Arc<dyn MemoryProbe>) -> Self {
        Self { limits, probe }
    }

    /// Batch size for the current memory headroom.
    pub fn batch_size(&self) -> usize {
        self.limits.batch_size(self.probe.available_bytes())
    }

    /// Matches every file, one batch at a time.
    ///
    /// Files within a batch are matched concurrently. A file that fails is
    /// recorded in [`ScanOutcome::failed`] and never aborts the scan.
    /// `on_progress` sees a non-decreasing `processed` count that ends at
    /// `total`; an empty corpus reports `0 / 0` once.
    pub async fn scan<F>(
        &self,
        files: &[PathBuf],
        matcher: &DependencyMatcher,
        ctx: &DependencyContext,
        mut on_progress: F,
    ) -> ScanOutcome
    where
        F: FnMut(ScanProgress<'_>),
    {
        let dependency = matcher.dependency();
        let total = files.len();
        let mut outcome = ScanOutcome::default();

        if files.is_empty() {
            on_progress(ScanProgress {
                dependency,
                processed: 0,
                total,
            });
            return outcome;
        }

        let batch_size = self.batch_size();
        debug!(dependency, total, batch_size, "scanning");

        let mut processed = 0;
        for batch in files.chunks(batch_size) {
            let results = join_all(batch.iter().map(|file| matcher.is_used(file, ctx))).await;

            for (file, result) in batch.iter().zip(results) {
                match result {
                    Ok(true) => outcome.files.push(file.clone()),
                    Ok(false) => {}
                    Err(e) => {
                        debug!(error = %e, "file skipped");
                        outcome.failed.push(file.clone());
                    }
                }
            }

            processed += batch.len();
            on_progress(ScanProgress {
                dependency,
                processed,
                total,
            });
        }

        if !outcome.failed.is_empty() {
            warn!(
                dependency,
                errors = outcome.failed.len(),
                "some files could not be scanned"
            );
        }

        outcome
    }
}

/// Scans `files` for `dependency` with the default scheduler.
pub async fn scan<F>(
    files: &[PathBuf],
    dependency: &str,
    ctx: &DependencyContext,
    on_progress: F,
) -> ScanOutcome
where
    F: FnMut(ScanProgress<'_>),
{
    let matcher = DependencyMatcher::new(dependency);
    ScanScheduler::default()
        .scan(files, &matcher, ctx, on_progress)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::fs;
    use tempfile::TempDir;

    fn scheduler(limits: BatchLimits) -> ScanScheduler {
        ScanScheduler::new(limits, Arc::new(FixedMemory(None)))
    }

    fn small_batches() -> BatchLimits {
        BatchLimits {
            min: 2,
            max: 2,
            ..BatchLimits::default()
        }
    }

    fn corpus(dir: &TempDir, count: usize, using: &[usize]) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.path().join(format!("f{i}.js"));
                let body = if using.contains(&i) {
                    "import axios from 'axios';"
                } else {
                    "export const x = 1;"
                };
                fs::write(&path, body).unwrap();
                path
            })
            .collect()
    }

    fn context(dir: &TempDir) -> DependencyContext {
        DependencyContext::new(dir.path(), BTreeMap::new(), HashMap::new())
    }

    #[test]
    fn test_parse_mem_available() {
        let meminfo = "MemTotal:       16000000 kB\nMemAvailable:    2048 kB\n";
        assert_eq!(parse_mem_available(meminfo), Some(2048 * 1024));
        assert_eq!(parse_mem_available("MemTotal: 1 kB\n"), None);
    }

    #[test]
    fn test_batch_size_follows_probe() {
        let per_batch = BatchLimits::default().bytes_per_batch;
        let tight = ScanScheduler::new(BatchLimits::default(), Arc::new(FixedMemory(Some(per_batch))));
        let roomy = ScanScheduler::new(
            BatchLimits::default(),
            Arc::new(FixedMemory(Some(per_batch * 1000))),
        );
        let unknown = ScanScheduler::new(BatchLimits::default(), Arc::new(FixedMemory(None)));

        assert_eq!(tight.batch_size(), 10);
        assert_eq!(roomy.batch_size(), 100);
        assert_eq!(unknown.batch_size(), 100);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_complete() {
        let dir = TempDir::new().unwrap();
        let files = corpus(&dir, 5, &[1, 4]);
        let ctx = context(&dir);
        let matcher = DependencyMatcher::new("axios");

        let mut seen = Vec::new();
        let outcome = scheduler(small_batches())
            .scan(&files, &matcher, &ctx, |p| seen.push((p.processed, p.total)))
            .await;

        assert_eq!(seen, vec![(2, 5), (4, 5), (5, 5)]);
        assert_eq!(outcome.files, vec![files[1].clone(), files[4].clone()]);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let dir = TempDir::new().unwrap();
        let mut files = corpus(&dir, 2, &[0]);
        files.insert(1, dir.path().join("missing.js"));
        let ctx = context(&dir);
        let matcher = DependencyMatcher::new("axios");

        let outcome = scheduler(small_batches())
            .scan(&files, &matcher, &ctx, |_| {})
            .await;

        assert_eq!(outcome.files, vec![files[0].clone()]);
        assert_eq!(outcome.failed, vec![files[1].clone()]);
        assert!(outcome.is_used());
    }

    #[tokio::test]
    async fn test_empty_corpus_reports_once() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        let mut seen = Vec::new();
        let outcome = scan(&[], "axios", &ctx, |p| seen.push((p.dependency.to_string(), p.processed, p.total))).await;

        assert_eq!(seen, vec![("axios".to_string(), 0, 0)]);
        assert!(!outcome.is_used());
    }
}
