//! Logging configuration using tracing
//!
//! Structured logging to stderr, filtered through the RUST_LOG environment variable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber
///
/// Filtering is controlled by RUST_LOG (defaults to "warn" for quiet CLI
/// output). Fan-out debugging benefits from per-module levels, e.g.
/// `RUST_LOG=buildlog::changelog=debug`.
///
/// # Errors
/// Returns an error if a subscriber has already been installed
pub fn init() -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).compact())
        .try_init()
        .map_err(|e| crate::BuildLogError::Other(format!("Failed to initialize tracing: {}", e)))?;

    Ok(())
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init();
}
