//! Graph module for installed-package relationships.
//!
//! Provides [`PackageGraph`], built once per run from the manifests under
//! `node_modules`, and answers "which top-level dependencies transitively
//! need this package".
//!
//! # Example
//!
//! ```rust
//! use depsweep::graph::PackageGraph;
//! use depsweep::parser::DependencyType;
//!
//! let mut graph = PackageGraph::new();
//! graph.add_requirement("react-dom", "react", DependencyType::Peer);
//!
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.edge_count(), 1);
//! ```

mod package_graph;

pub use package_graph::{
    installed_manifest_path, DependencyEdge, PackageGraph, PackageNode, NODE_MODULES,
};
