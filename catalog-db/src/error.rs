//! Structured error types for catalog-db.
//!
//! Library consumers get a `thiserror` enum; the server binary wraps these
//! with `anyhow` context.

use thiserror::Error;

/// Main error type for pool, session and registry operations
#[derive(Error, Debug)]
pub enum DbError {
    /// `DATABASE_URL` is not set or is blank
    #[error(
        "DATABASE_URL is not configured. Check that your .env file exists and contains a value, \
         or export DATABASE_URL in the environment"
    )]
    MissingDatabaseUrl,

    /// `DATABASE_URL` could not be parsed as a PostgreSQL connection string
    #[error("Invalid DATABASE_URL: {source}")]
    InvalidUrl { source: sqlx::Error },

    /// Reading the `.env` file failed (present but unreadable or malformed)
    #[error("Failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },

    /// Error reported by the driver or the pool (acquire, network, query)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A staged write argument could not be encoded
    #[error("Failed to encode argument for staged write: {reason}")]
    Encode { reason: String },

    /// A staged write failed; the transaction is aborted until rolled back
    #[error("Session transaction failed during flush ({remaining} staged writes not sent); call rollback() before reusing the session")]
    SessionFailed { remaining: usize },

    /// Two models claimed the same table
    #[error("Model for table '{table}' is already registered")]
    DuplicateModel { table: &'static str },
}

/// Result type alias for catalog-db operations
pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Create an encode error
    pub fn encode(reason: impl Into<String>) -> Self {
        Self::Encode {
            reason: reason.into(),
        }
    }

    /// True for errors raised while acquiring or talking to a connection
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Sqlx(
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            )
        )
    }
}
