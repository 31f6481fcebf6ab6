//! Health check endpoint
//!
//! Runs the liveness query through the request's injected session, so a
//! green response proves the whole acquire/use/release path.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use catalog_db::{Database, DbError, DbSession};
use serde::Serialize;

use crate::server::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: DatabaseHealth,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub pool_size: u32,
    pub idle: usize,
}

/// GET /health
async fn health(
    State(db): State<Database>,
    mut session: DbSession,
) -> Result<Json<HealthResponse>, DbError> {
    liveness_query(&mut session).await?;
    let stats = db.stats();

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database: DatabaseHealth {
            connected: true,
            pool_size: stats.size,
            idle: stats.idle,
        },
    }))
}

async fn liveness_query(session: &mut DbSession) -> Result<(), DbError> {
    let conn = session.conn().await?;
    catalog_db::probe::select_one(conn).await
}

/// Health routes
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
