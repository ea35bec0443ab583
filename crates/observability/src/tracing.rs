//! Tracing/logging initialization.
//!
//! The engine crates emit structured events (`info!`/`warn!`/`error!` with
//! entity-id fields); this module decides how they are rendered. JSON lines
//! by default, filterable via `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops). The scheduler
/// binary and tests both go through here, so repeated initialization must
/// never panic.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
