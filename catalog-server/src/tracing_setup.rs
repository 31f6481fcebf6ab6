//! Tracing setup for catalog-server
//!
//! Usage:
//!   catalog-server --debug                 # Debug logging to console
//!   RUST_LOG=catalog_db=debug catalog-server
//!
//! Statement logging from sqlx (`ENVIRONMENT=development`) is emitted on the
//! `sqlx::query` target at INFO and therefore shows up under the default
//! filter.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Enable debug logging (sets the filter to debug unless RUST_LOG is set)
    pub debug: bool,
}

/// Initialize console tracing
pub fn init(config: &TracingConfig) -> Result<()> {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
