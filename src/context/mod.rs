//! Per-run analysis context.
//!
//! Holds the manifest's scripts, every parsed configuration file, and a
//! lazily built graph of installed packages.

mod builder;

pub use builder::{
    is_config_file, relative_key, ConfigValue, ContextBuilder, DependencyContext, MANIFEST_KEY,
};
