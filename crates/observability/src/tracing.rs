//! Tracing/logging initialization.
//!
//! One JSON line per event, filtered through `RUST_LOG`. Claim/finalize
//! activity logs at debug/info and handler failures at warn, so a quiet
//! queue produces a quiet log.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default_filter("info");
}

/// Same as [`init`], with an explicit fallback filter for when `RUST_LOG`
/// is unset. Tests and embedded setups use this to turn the volume up or
/// down without touching the environment.
pub fn init_with_default_filter(default: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
