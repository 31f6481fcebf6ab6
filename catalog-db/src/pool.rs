//! Database connection pool management
//!
//! Uses sqlx PgPool with a fixed idle floor and a hard cap. The pool is
//! built lazily: no connection is opened until the first acquire.

use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{DbError, Result};

/// Connections kept open while idle.
pub const DEFAULT_MIN_IDLE: u32 = 5;

/// Extra connections allowed under concurrent load.
pub const DEFAULT_MAX_OVERFLOW: u32 = 10;

/// Idle time after which connections above the idle floor are closed.
pub const DEFAULT_OVERFLOW_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pool policy derived from [`DatabaseConfig`].
#[derive(Clone)]
pub struct PoolSettings {
    pub database_url: String,
    pub min_idle: u32,
    pub max_overflow: u32,
    /// Ping a pooled connection before handing it out
    pub test_before_acquire: bool,
    /// Log every statement (development only)
    pub echo: bool,
    /// `None` keeps the driver default
    pub acquire_timeout: Option<Duration>,
    /// sqlx only reaps connections above `min_idle`, so this shrinks the
    /// pool back to the floor after a burst
    pub overflow_idle_timeout: Duration,
}

impl std::fmt::Debug for PoolSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSettings")
            .field("database_url", &"<redacted>")
            .field("min_idle", &self.min_idle)
            .field("max_overflow", &self.max_overflow)
            .field("test_before_acquire", &self.test_before_acquire)
            .field("echo", &self.echo)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("overflow_idle_timeout", &self.overflow_idle_timeout)
            .finish()
    }
}

impl PoolSettings {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            database_url: config.database_url.clone(),
            min_idle: DEFAULT_MIN_IDLE,
            max_overflow: DEFAULT_MAX_OVERFLOW,
            test_before_acquire: true,
            echo: config.environment.is_development(),
            acquire_timeout: None,
            overflow_idle_timeout: DEFAULT_OVERFLOW_IDLE_TIMEOUT,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    pub fn with_overflow_idle_timeout(mut self, timeout: Duration) -> Self {
        self.overflow_idle_timeout = timeout;
        self
    }

    /// Hard cap on open physical connections.
    pub fn max_connections(&self) -> u32 {
        self.min_idle + self.max_overflow
    }

    /// Level at which executed statements are logged.
    pub fn statement_log_level(&self) -> LevelFilter {
        if self.echo {
            LevelFilter::Info
        } else {
            LevelFilter::Off
        }
    }

    fn connect_options(&self) -> Result<PgConnectOptions> {
        let options = PgConnectOptions::from_str(&self.database_url)
            .map_err(|source| DbError::InvalidUrl { source })?;

        Ok(match self.statement_log_level() {
            LevelFilter::Off => options.disable_statement_logging(),
            level => options.log_statements(level),
        })
    }

    fn pool_options(&self) -> PgPoolOptions {
        let options = PgPoolOptions::new()
            .min_connections(self.min_idle)
            .max_connections(self.max_connections())
            .test_before_acquire(self.test_before_acquire)
            .idle_timeout(self.overflow_idle_timeout);

        match self.acquire_timeout {
            Some(timeout) => options.acquire_timeout(timeout),
            None => options,
        }
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Open physical connections (idle + checked out)
    pub size: u32,
    pub idle: usize,
}

impl PoolStats {
    pub fn in_use(&self) -> usize {
        (self.size as usize).saturating_sub(self.idle)
    }
}

/// Process-wide database handle owned by the composition root.
///
/// Cloning is cheap and shares the same pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Build the pool without connecting.
    ///
    /// Must be called from inside a tokio runtime; sqlx spawns its pool
    /// maintenance task here.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidUrl`] if the connection string does not parse.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = DatabaseConfig::from_env()?;
    /// let db = Database::connect_lazy(&PoolSettings::from_config(&config))?;
    /// ```
    pub fn connect_lazy(settings: &PoolSettings) -> Result<Self> {
        let connect_options = settings.connect_options()?;
        let pool = settings.pool_options().connect_lazy_with(connect_options);

        info!(
            min_idle = settings.min_idle,
            max_connections = settings.max_connections(),
            echo = settings.echo,
            "database pool configured"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    /// Drain the pool: wait for checked-out connections to come back and
    /// close them all. Further acquires fail with `PoolClosed`.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("database pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
