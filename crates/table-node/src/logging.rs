//! Tracing subscriber setup.

use crate::config::LogConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
///
/// # Errors
///
/// Invalid filter directive, or a subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if config.json {
        builder.json().try_init().map_err(|e| anyhow!("installing tracing subscriber: {e}"))
    } else {
        builder.try_init().map_err(|e| anyhow!("installing tracing subscriber: {e}"))
    }
}
