//! Tracing subscriber setup for applications and tests.

use tracing_subscriber::{fmt, EnvFilter};

use crate::types::{Result, TreeError};

/// Installs a global `fmt` subscriber filtered by `level` (an `EnvFilter`
/// directive such as `"info"` or `"canopy=debug"`).
///
/// Fails if the directive does not parse or a subscriber is already installed.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| TreeError::Config(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| TreeError::Config("logging already initialized".into()))
}

/// Installs a test-friendly subscriber once, honoring `RUST_LOG`.
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("canopy=warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}
