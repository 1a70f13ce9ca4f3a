//! Fixed-point computation of the unused set.
//!
//! A dependency starts out unused when nothing uses it directly and no
//! top-level dependency requires it. Each pass then promotes every
//! dependency with no direct usage whose requirers are all already unused.
//! Passes repeat until one adds nothing; the set only grows, so this stops
//! after at most one pass per dependency.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::engine::DependencyInfo;

/// The unused set and how many closure passes it took.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub unused: BTreeSet<String>,
    /// Closure passes run, including the final one that added nothing.
    pub passes: usize,
}

/// Computes the unused set over per-dependency usage records.
///
/// Requirers missing from `infos` are treated as used.
///
/// ```
/// use std::collections::BTreeMap;
/// use depsweep::engine::DependencyInfo;
/// use depsweep::resolver::resolve_unused;
///
/// let mut infos = BTreeMap::new();
/// infos.insert("lodash".to_string(), DependencyInfo::default());
/// infos.insert(
///     "react".to_string(),
///     DependencyInfo { used_in_files: vec!["src/app.js".into()], ..Default::default() },
/// );
///
/// let resolution = resolve_unused(&infos);
/// assert_eq!(resolution.unused.into_iter().collect::<Vec<_>>(), vec!["lodash"]);
/// ```
pub fn resolve_unused<I>(infos: &BTreeMap<String, I>) -> Resolution
where
    I: Borrow<DependencyInfo>,
{
    let mut unused: BTreeSet<String> = infos
        .iter()
        .filter(|(_, info)| {
            let info: &DependencyInfo = <I as Borrow<DependencyInfo>>::borrow(*info);
            info.used_in_files.is_empty() && info.required_by_packages.is_empty()
        })
        .map(|(name, _)| name.clone())
        .collect();

    let mut passes = 0;
    loop {
        passes += 1;
        let promoted: Vec<String> = infos
            .iter()
            .filter(|(name, _)| !unused.contains(*name))
            .filter(|(_, info)| {
                let info: &DependencyInfo = <I as Borrow<DependencyInfo>>::borrow(*info);
                info.used_in_files.is_empty()
                    && info
                        .required_by_packages
                        .iter()
                        .all(|requirer| unused.contains(requirer))
            })
            .map(|(name, _)| name.clone())
            .collect();

        if promoted.is_empty() {
            break;
        }
        debug!(pass = passes, promoted = ?promoted, "closure pass");
        unused.extend(promoted);
    }

    Resolution { unused, passes }
}
