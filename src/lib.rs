//! depsweep - finds declared npm dependencies that nothing in a project uses.
//!
//! A dependency counts as used when source code imports it, a script or
//! configuration file mentions it, or another used dependency needs it
//! through the installed package tree. Everything else is proposed for
//! removal.

pub mod analysis;
pub mod config;
pub mod context;
pub mod discovery;
pub mod engine;
pub mod export;
pub mod graph;
pub mod logging;
pub mod parser;
pub mod resolver;
