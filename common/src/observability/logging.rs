//! Tracing subscriber setup.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::LogColor;

/// Installs the global subscriber, logging to stderr.
///
/// `RUST_LOG` overrides `default_filter` when set.
///
/// # Errors
///
/// Returns an error if the filter does not parse or a subscriber is
/// already installed.
pub fn init_tracing(color: LogColor, default_filter: &str) -> Result<()> {
    // ---
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color.for_stderr())
        .try_init()
        .map_err(|e| anyhow!(e))
}
