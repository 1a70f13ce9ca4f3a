//! File corpus discovery for the command-line tool.
//!
//! Walks the project the way git sees it: `.gitignore`, `.ignore` and
//! `.git/info/exclude` rules apply, whether or not the project is a git
//! checkout. Hidden files stay in, since many tool configs are dotfiles.

use std::path::{Path, PathBuf};

use ignore::{DirEntry, WalkBuilder};
use tracing::debug;

/// Directories never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    "coverage",
    ".turbo",
];

fn is_ignored_dir(entry: &DirEntry, extra: &[String]) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_some_and(|t| t.is_dir()) {
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    IGNORED_DIRS.contains(&name.as_ref()) || extra.iter().any(|dir| dir == name.as_ref())
}

/// Every file under `root` not excluded by ignore rules, [`IGNORED_DIRS`]
/// or `extra`, in a stable order.
pub fn collect_files(root: &Path, extra: &[String]) -> Vec<PathBuf> {
    let extra = extra.to_vec();

    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |e| !is_ignored_dir(e, &extra))
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "skipping unwalkable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
        .map(DirEntry::into_path)
        .collect()
}
