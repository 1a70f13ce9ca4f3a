//! Installed-package graph using petgraph.
//!
//! Nodes are packages found under `node_modules` (plus any name they
//! require, installed or not). Edges point from a package to each name it
//! declares in its runtime, peer or optional sections.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::parser::{parse_str, DependencyType, PackageJson, MANIFEST_FILE};

/// Directory holding installed packages.
pub const NODE_MODULES: &str = "node_modules";

/// Concurrent manifest reads while loading the graph.
const MANIFEST_READ_CONCURRENCY: usize = 64;

/// A package in the installed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    /// Package name, scope included (e.g. "@babel/core").
    pub name: String,
    /// False for names that are only referenced by other manifests.
    pub installed: bool,
}

impl PackageNode {
    fn referenced(name: &str) -> Self {
        Self {
            name: name.to_string(),
            installed: false,
        }
    }
}

/// Edge metadata: which manifest section declared the requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DependencyEdge {
    pub kind: DependencyType,
}

/// Which installed packages require which other packages.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeSet;
/// use depsweep::graph::PackageGraph;
/// use depsweep::parser::DependencyType;
///
/// let mut graph = PackageGraph::new();
/// graph.add_requirement("express", "body-parser", DependencyType::Production);
/// graph.add_requirement("body-parser", "bytes", DependencyType::Production);
///
/// let top_level: BTreeSet<String> = ["express".to_string()].into();
/// let requirers = graph.required_by("bytes", &top_level);
/// assert!(requirers.contains("express"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    graph: DiGraph<PackageNode, DependencyEdge>,
    node_indices: HashMap<String, NodeIndex>,
    skipped_packages: usize,
}

impl PackageGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every installed manifest under `<root>/node_modules`.
    ///
    /// Scoped packages (`@scope/name`) are found one level down. A
    /// malformed or unreadable manifest is skipped and counted; it never
    /// fails the load. A missing `node_modules` yields an empty graph.
    pub async fn load(root: &Path) -> Self {
        let mut graph = Self::new();
        let dirs = installed_package_dirs(&root.join(NODE_MODULES)).await;

        let manifests: Vec<(String, Option<PackageJson>)> = stream::iter(dirs)
            .map(|(name, dir)| async move {
                let path = dir.join(MANIFEST_FILE);
                let parsed = match tokio::fs::read_to_string(&path).await {
                    Ok(content) => match parse_str(&content) {
                        Ok(pkg) => Some(pkg),
                        Err(e) => {
                            debug!(path = %path.display(), error = %e, "malformed installed manifest");
                            None
                        }
                    },
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "unreadable installed manifest");
                        None
                    }
                };
                (name, parsed)
            })
            .buffer_unordered(MANIFEST_READ_CONCURRENCY)
            .collect()
            .await;

        for (name, manifest) in manifests {
            match manifest {
                Some(pkg) => graph.add_installed(&name, &pkg),
                None => graph.skipped_packages += 1,
            }
        }

        if graph.skipped_packages > 0 {
            warn!(skipped = graph.skipped_packages, "skipped malformed installed packages");
        }
        debug!(
            packages = graph.node_count(),
            edges = graph.edge_count(),
            cyclic = graph.has_cycles(),
            "installed package graph loaded"
        );
        graph
    }

    /// Records an installed package and every requirement it declares.
    pub fn add_installed(&mut self, name: &str, pkg: &PackageJson) {
        let idx = self.ensure_node(name);
        self.graph[idx].installed = true;

        for (required, kind) in pkg.installed_requirements() {
            self.add_requirement(name, required, kind);
        }
    }

    /// Adds an edge `from -> to`, creating either node if needed.
    ///
    /// Self-requirements are ignored.
    pub fn add_requirement(&mut self, from: &str, to: &str, kind: DependencyType) {
        if from == to {
            return;
        }
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        self.graph.add_edge(from_idx, to_idx, DependencyEdge { kind });
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(PackageNode::referenced(name));
        self.node_indices.insert(name.to_string(), idx);
        idx
    }

    /// Gets a node by package name.
    pub fn get_node(&self, name: &str) -> Option<&PackageNode> {
        self.node_indices
            .get(name)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// True if `name` has an installed manifest.
    pub fn is_installed(&self, name: &str) -> bool {
        self.get_node(name).is_some_and(|node| node.installed)
    }

    /// Names `name` itself requires (outgoing edges).
    pub fn requirements_of(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(name) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| self.graph[edge.target()].name.as_str())
            .collect()
    }

    /// Installed packages that declare `name` as a peer dependency.
    pub fn peer_dependents(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(name) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|edge| edge.weight().kind == DependencyType::Peer)
            .map(|edge| self.graph[edge.source()].name.as_str())
            .collect()
    }

    /// Top-level dependencies that transitively require `target`.
    ///
    /// Walks requirement edges backwards from `target`. A requirer that is
    /// itself in `top_level` is collected and not walked further; any other
    /// requirer becomes the next target. Each node is visited at most once
    /// per query, so cycles in the installed tree terminate.
    pub fn required_by(&self, target: &str, top_level: &BTreeSet<String>) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let Some(&start) = self.node_indices.get(target) else {
            return result;
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(idx) = queue.pop_front() {
            for edge in self.graph.edges_directed(idx, Direction::Incoming) {
                let source = edge.source();
                if !visited.insert(source) {
                    continue;
                }
                let name = &self.graph[source].name;
                if top_level.contains(name) {
                    result.insert(name.clone());
                } else {
                    queue.push_back(source);
                }
            }
        }

        result
    }

    /// Checks if the installed tree contains cycles.
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Number of installed manifests that could not be read or parsed.
    pub fn skipped_packages(&self) -> usize {
        self.skipped_packages
    }

    /// Returns the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Checks if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

/// Path of an installed package's manifest.
pub fn installed_manifest_path(root: &Path, name: &str) -> PathBuf {
    let mut path = root.join(NODE_MODULES);
    for segment in name.split('/') {
        path.push(segment);
    }
    path.join(MANIFEST_FILE)
}

/// Lists `(package name, directory)` for every package under `node_modules`.
async fn installed_package_dirs(node_modules: &Path) -> Vec<(String, PathBuf)> {
    let mut out = Vec::new();
    for (name, dir) in list_dirs(node_modules).await {
        if name.starts_with('.') {
            continue;
        }
        if name.starts_with('@') {
            for (inner, inner_dir) in list_dirs(&dir).await {
                if !inner.starts_with('.') {
                    out.push((format!("{}/{}", name, inner), inner_dir));
                }
            }
        } else {
            out.push((name, dir));
        }
    }
    out.sort();
    out
}

/// Directory (or symlinked directory) entries of `dir`; empty on any error.
async fn list_dirs(dir: &Path) -> Vec<(String, PathBuf)> {
    let mut out = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return out;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if !(file_type.is_dir() || file_type.is_symlink()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            out.push((name.to_string(), entry.path()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn top(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn install(root: &Path, name: &str, manifest: &str) {
        let path = installed_manifest_path(root, name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, manifest).unwrap();
    }

    #[test]
    fn test_create_empty_graph() {
        let graph = PackageGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.has_cycles());
    }

    #[test]
    fn test_add_requirement_creates_nodes() {
        let mut graph = PackageGraph::new();
        graph.add_requirement("react-dom", "react", DependencyType::Peer);
        graph.add_requirement("react", "react", DependencyType::Production);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.is_installed("react"));
        assert_eq!(graph.requirements_of("react-dom"), vec!["react"]);
        assert_eq!(graph.peer_dependents("react"), vec!["react-dom"]);
    }

    #[test]
    fn test_required_by_direct_top_level() {
        let mut graph = PackageGraph::new();
        graph.add_requirement("webpack", "acorn", DependencyType::Production);

        let result = graph.required_by("acorn", &top(&["webpack", "acorn"]));
        assert_eq!(result, top(&["webpack"]));
    }

    #[test]
    fn test_required_by_through_intermediate() {
        let mut graph = PackageGraph::new();
        graph.add_requirement("jest", "jest-cli", DependencyType::Production);
        graph.add_requirement("jest-cli", "yargs", DependencyType::Production);
        graph.add_requirement("eslint", "yargs", DependencyType::Production);

        let result = graph.required_by("yargs", &top(&["jest", "eslint", "yargs"]));
        assert_eq!(result, top(&["eslint", "jest"]));
    }

    #[test]
    fn test_required_by_stops_at_top_level() {
        let mut graph = PackageGraph::new();
        graph.add_requirement("a", "b", DependencyType::Production);
        graph.add_requirement("b", "c", DependencyType::Production);

        // b is top-level: a is reached only through b and is not reported
        let result = graph.required_by("c", &top(&["a", "b", "c"]));
        assert_eq!(result, top(&["b"]));
    }

    #[test]
    fn test_required_by_terminates_on_cycles() {
        let mut graph = PackageGraph::new();
        graph.add_requirement("x", "y", DependencyType::Production);
        graph.add_requirement("y", "x", DependencyType::Production);
        graph.add_requirement("y", "target", DependencyType::Production);
        graph.add_requirement("target", "x", DependencyType::Production);

        assert!(graph.has_cycles());
        let result = graph.required_by("target", &top(&["target"]));
        assert!(result.is_empty());
    }

    #[test]
    fn test_required_by_unknown_target() {
        let graph = PackageGraph::new();
        assert!(graph.required_by("nope", &top(&["a"])).is_empty());
    }

    #[test]
    fn test_installed_manifest_path_scoped() {
        let path = installed_manifest_path(Path::new("/p"), "@babel/core");
        assert_eq!(path, PathBuf::from("/p/node_modules/@babel/core/package.json"));
    }

    #[tokio::test]
    async fn test_load_reads_scoped_and_skips_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        install(root, "express", r#"{"version": "4.18.0", "dependencies": {"body-parser": "1"}}"#);
        install(root, "@babel/core", r#"{"dependencies": {"@babel/parser": "7"}}"#);
        install(root, "broken", "{ not json");
        fs::create_dir_all(root.join("node_modules/.bin")).unwrap();

        let graph = PackageGraph::load(root).await;

        assert!(graph.is_installed("express"));
        assert!(graph.is_installed("@babel/core"));
        assert!(!graph.is_installed("body-parser"));
        assert!(graph.get_node("express").unwrap().installed);
        assert_eq!(graph.requirements_of("@babel/core"), vec!["@babel/parser"]);
        assert_eq!(graph.skipped_packages(), 1);
    }

    #[tokio::test]
    async fn test_load_without_node_modules() {
        let dir = tempfile::tempdir().unwrap();
        let graph = PackageGraph::load(dir.path()).await;
        assert!(graph.is_empty());
        assert_eq!(graph.skipped_packages(), 0);
    }
}
