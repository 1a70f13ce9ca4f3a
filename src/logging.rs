//! Logging setup using **tracing**.
//!
//! The engine only emits `tracing` events; installing a subscriber is the
//! binary's job. Output goes to stderr so stdout stays clean for reports.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Maps `-v` repetitions to a default level.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `verbosity` when set
/// (e.g. `RUST_LOG=depsweep::analysis=debug`). Calling this twice is a
/// no-op for the second call.
pub fn init(verbosity: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity).as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().with_ansi(false).with_current_span(true).try_init()
    } else {
        builder.compact().try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
