//! catalog-db: PostgreSQL access layer for the catalog service
//!
//! Configuration loading, a lazily connected sqlx pool, per-request
//! sessions with explicit commit, a startup connectivity probe and an
//! explicit model registry.

pub mod config;
pub mod error;
pub mod extract;
pub mod pool;
pub mod probe;
pub mod registry;
pub mod session;

pub use config::{DatabaseConfig, Environment};
pub use error::{DbError, Result};
pub use extract::DbSession;
pub use pool::{Database, PoolSettings, PoolStats};
pub use registry::{Model, ModelDef, ModelRegistry};
pub use session::{PendingWrite, Session};
