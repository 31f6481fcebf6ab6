//! Startup connectivity check

use sqlx::PgConnection;
use tracing::{error, info};

use crate::error::Result;
use crate::pool::Database;

impl Database {
    /// Round-trip `SELECT 1` through a freshly acquired connection.
    ///
    /// Meant to run once at startup so the caller can decide whether to
    /// abort. Database errors are logged and reported as `false`; this
    /// never returns an error.
    pub async fn verify_connection(&self) -> bool {
        match self.ping().await {
            Ok(()) => {
                info!("database connection verified");
                true
            }
            Err(e) => {
                error!("Error connecting to the database: {}", e);
                false
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool().acquire().await?;
        select_one(&mut *conn).await
    }
}

/// The liveness query: the cheapest possible round-trip.
pub async fn select_one(conn: &mut PgConnection) -> Result<()> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(conn)
        .await?;
    Ok(())
}
