//! Logging initialization
//!
//! Console tracing with `RUST_LOG`-style filtering. Hosts embedding the
//! importer can install their own subscriber instead; initialization here
//! is idempotent and loses to any subscriber already in place.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize console logging. `default_directive` applies when `RUST_LOG`
/// is unset, e.g. `"sheetpress=info"`.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Ignore the error when a global subscriber is already set.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
