//! Tracing/logging initialization.
//!
//! Logs go to stderr so that stdout stays free for the runner's console
//! lines. Job outcomes are logged under the `background_jobs` and
//! `background_jobs_errors` targets; keep targets in the output so they can be
//! told apart, and filter them with `RUST_LOG` (e.g.
//! `RUST_LOG=info,background_jobs_errors=error`).

use tracing_subscriber::EnvFilter;

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize JSON tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    // JSON logs + timestamps, configurable via RUST_LOG.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initialize compact, human-readable tracing/logging.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_pretty() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .compact()
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
