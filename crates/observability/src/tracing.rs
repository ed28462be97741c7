//! Tracing/logging initialization.
//!
//! The write core itself only emits `tracing` events; hosts decide how to
//! render them. This module is the default wiring for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process.
///
/// Reads `RUST_LOG` for filtering (defaulting to `info`) and emits JSON
/// lines. Safe to call multiple times; only the first call installs a
/// subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .try_init();
}
