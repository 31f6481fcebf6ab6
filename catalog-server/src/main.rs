//! catalog-server: composition root for the catalog service
//!
//! Loads configuration (failing fast when `DATABASE_URL` is missing), builds
//! the pool, runs the startup connectivity probe and serves until shutdown.

mod routes;
mod server;
mod tracing_setup;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use catalog_db::config::{self, DATABASE_URL_VAR};
use catalog_db::{Database, DatabaseConfig, PoolSettings};
use clap::Parser;

use server::{run_server, ServerConfig};
use tracing_setup::TracingConfig;

/// Catalog service database front end
#[derive(Parser, Debug)]
#[command(name = "catalog-server", version, about)]
struct Args {
    /// Address to bind to
    #[arg(long, short = 'b', default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Database URL (overrides .env)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Give up acquiring a connection after this many seconds
    #[arg(long, value_name = "SECS")]
    acquire_timeout_secs: Option<u64>,

    /// Only run the connectivity check and exit
    #[arg(long)]
    check: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing so clap's env fallback sees values from .env
    let dotenv = config::load_dotenv();

    let args = Args::parse();
    tracing_setup::init(&TracingConfig { debug: args.debug })?;

    match dotenv.context("Failed to read .env")? {
        Some(path) => tracing::info!("Loaded configuration from {}", path.display()),
        None => tracing::debug!("No .env file found"),
    }

    let db_config = DatabaseConfig::from_lookup(|key| {
        if key == DATABASE_URL_VAR {
            args.database_url.clone()
        } else {
            std::env::var(key).ok()
        }
    })
    .context("Invalid database configuration")?;
    tracing::info!(environment = %db_config.environment, "configuration loaded");

    let mut settings = PoolSettings::from_config(&db_config);
    if let Some(secs) = args.acquire_timeout_secs {
        settings = settings.with_acquire_timeout(Duration::from_secs(secs));
    }

    let db = Database::connect_lazy(&settings).context("Failed to create database pool")?;

    if !db.verify_connection().await {
        db.close().await;
        bail!("database connectivity check failed; aborting startup");
    }

    if args.check {
        db.close().await;
        return Ok(());
    }

    run_server(
        db,
        ServerConfig {
            bind_addr: args.bind,
        },
    )
    .await
    .context("Server error")?;

    Ok(())
}
