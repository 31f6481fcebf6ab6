//! Axum integration: per-request session injection and error responses

use std::convert::Infallible;
use std::ops::{Deref, DerefMut};

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::DbError;
use crate::pool::Database;
use crate::session::Session;

/// A fresh [`Session`] for the current request.
///
/// Extraction never touches the network: the connection is checked out on
/// first use inside the handler. The session is released when the handler
/// returns and the extractor is dropped, whatever the outcome.
///
/// ```ignore
/// async fn list(mut db: DbSession) -> Result<Json<Vec<String>>, DbError> {
///     let names = sqlx::query_scalar("SELECT name FROM products")
///         .fetch_all(db.conn().await?)
///         .await?;
///     Ok(Json(names))
/// }
/// ```
#[derive(Debug)]
pub struct DbSession(pub Session);

impl<S> FromRequestParts<S> for DbSession
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Database::from_ref(state).session()))
    }
}

impl Deref for DbSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.0
    }
}

impl DerefMut for DbSession {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.0
    }
}

impl IntoResponse for DbError {
    fn into_response(self) -> Response {
        let (status, code) = if self.is_connection_error() {
            (StatusCode::SERVICE_UNAVAILABLE, "database_unavailable")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        };

        // Log the actual error, return a generic message
        tracing::error!("Database error: {}", self);

        let body = json!({
            "error": code,
            "message": "the database could not complete the request"
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_errors_are_503() {
        let response = DbError::Sqlx(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn other_errors_are_500() {
        let response = DbError::Sqlx(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn body_does_not_leak_details() {
        let response = DbError::encode("secret detail").into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("internal_error"));
        assert!(!text.contains("secret detail"));
    }
}
