//! Tracing/logging setup shared by the queue binaries and tests.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{init, init_with_default_filter};
