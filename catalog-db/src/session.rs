//! Per-unit-of-work sessions
//!
//! A [`Session`] is a single-owner handle over one pooled connection:
//!
//! - The connection is checked out lazily, on first use, and a transaction
//!   is opened at that moment. Nothing is ever committed implicitly.
//! - Writes staged with [`Session::add`] stay in memory until
//!   [`Session::flush`] or [`Session::commit`]. Reads never flush.
//! - Dropping a session rolls back whatever is still open and returns the
//!   connection to the pool, on every exit path including panics.

use futures::future::BoxFuture;
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, Encode, PgConnection, PgPool, Postgres, Transaction, Type};
use tracing::{debug, warn};

use crate::error::{DbError, Result};
use crate::pool::Database;

/// A write statement held in memory until the session flushes.
pub struct PendingWrite {
    sql: String,
    args: PgArguments,
}

impl PendingWrite {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: PgArguments::default(),
        }
    }

    /// Bind the next positional parameter (`$1`, `$2`, ...).
    pub fn bind<T>(mut self, value: T) -> Result<Self>
    where
        T: for<'q> Encode<'q, Postgres> + Type<Postgres> + Send + 'static,
    {
        self.args
            .add(value)
            .map_err(|e| DbError::encode(e.to_string()))?;
        Ok(self)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl std::fmt::Debug for PendingWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWrite")
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}

/// Logical database session bound to the pool.
///
/// Not `Clone`; every operation takes `&mut self`, so a session cannot be
/// shared between concurrent units of work.
pub struct Session {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    pending: Vec<PendingWrite>,
    /// Set when a staged write fails; cleared by rollback
    failed: bool,
}

impl Session {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tx: None,
            pending: Vec::new(),
            failed: false,
        }
    }

    /// Connection for ad-hoc queries, inside the session's transaction.
    ///
    /// Checks a connection out of the pool and begins a transaction if
    /// none is open yet. Staged writes are *not* flushed first.
    ///
    /// # Errors
    ///
    /// Pool exhaustion and network failures propagate unchanged. After a
    /// failed flush this returns [`DbError::SessionFailed`] until
    /// [`Session::rollback`] is called.
    pub async fn conn(&mut self) -> Result<&mut PgConnection> {
        self.ensure_usable()?;
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                let tx = self.pool.begin().await?;
                debug!("session checked out connection and began transaction");
                tx
            }
        };
        Ok(&mut **self.tx.insert(tx))
    }

    /// Stage a write. Nothing reaches the database until flush or commit.
    pub fn add(&mut self, write: PendingWrite) {
        self.pending.push(write);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// True after a staged write failed; only rollback or close are allowed.
    pub fn needs_rollback(&self) -> bool {
        self.failed
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.failed {
            return Err(DbError::SessionFailed {
                remaining: self.pending.len(),
            });
        }
        Ok(())
    }

    /// True while a connection is checked out with an open transaction.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Send staged writes inside the open transaction, in staging order.
    ///
    /// Returns the total number of affected rows. Flushed writes are still
    /// uncommitted and invisible to other sessions.
    ///
    /// # Errors
    ///
    /// If a write fails, PostgreSQL aborts the transaction: the session is
    /// marked as needing rollback, writes not yet sent stay staged, and
    /// `commit` refuses to run until [`Session::rollback`].
    pub async fn flush(&mut self) -> Result<u64> {
        self.ensure_usable()?;
        if self.pending.is_empty() {
            return Ok(0);
        }

        // Check out first so a failed acquire leaves the writes staged.
        self.conn().await?;
        let Some(tx) = self.tx.as_mut() else {
            return Ok(0);
        };

        let mut writes = std::mem::take(&mut self.pending).into_iter();
        let count = writes.len();
        let mut affected = 0;
        while let Some(PendingWrite { sql, args }) = writes.next() {
            match sqlx::query_with(&sql, args).execute(&mut **tx).await {
                Ok(done) => affected += done.rows_affected(),
                Err(e) => {
                    self.failed = true;
                    self.pending = writes.collect();
                    warn!(
                        error = %e,
                        remaining = self.pending.len(),
                        "staged write failed, session needs rollback"
                    );
                    return Err(e.into());
                }
            }
        }

        debug!(writes = count, rows = affected, "session flushed");
        Ok(affected)
    }

    /// Flush staged writes and commit the open transaction.
    ///
    /// The connection goes back to the pool; the next use of the session
    /// checks one out again and begins a fresh transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::SessionFailed`] without touching the database if
    /// an earlier flush failed.
    pub async fn commit(&mut self) -> Result<()> {
        self.flush().await?;
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            debug!("session committed");
        }
        Ok(())
    }

    /// Discard staged writes and roll back the open transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        let discarded = self.pending.len();
        self.pending.clear();
        self.failed = false;
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        debug!(discarded, "session rolled back");
        Ok(())
    }

    /// Release the session: uncommitted work is discarded and the
    /// connection is returned to the pool.
    ///
    /// # Errors
    ///
    /// A failed rollback (for example a connection the server already
    /// dropped) propagates; the connection is still released.
    pub async fn close(mut self) -> Result<()> {
        self.pending.clear();
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // sqlx queues the rollback on the transaction's own drop and returns
        // the connection once it has run.
        if self.tx.is_some() {
            debug!(
                discarded = self.pending.len(),
                "session dropped with open transaction, rolling back"
            );
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("in_transaction", &self.in_transaction())
            .field("pending", &self.pending.len())
            .field("failed", &self.failed)
            .finish()
    }
}

impl Database {
    /// New session bound to this pool. No connection is taken yet.
    pub fn session(&self) -> Session {
        Session::new(self.pool().clone())
    }

    /// Run one unit of work with a fresh session and always release it.
    ///
    /// The session is closed after `work` finishes, whether it returned
    /// `Ok` or `Err`. If `work` panics the session is released by `Drop`.
    /// When `work` succeeds but the release fails, the release error is
    /// returned; when both fail, `work`'s error wins and the release error
    /// is logged.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = db
    ///     .scoped(|session| {
    ///         Box::pin(async move {
    ///             let n = sqlx::query_scalar("SELECT COUNT(*) FROM products")
    ///                 .fetch_one(session.conn().await?)
    ///                 .await?;
    ///             Ok::<_, DbError>(n)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn scoped<F, T, E>(&self, work: F) -> std::result::Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, std::result::Result<T, E>>,
        E: From<DbError>,
    {
        let mut session = self.session();
        let outcome = work(&mut session).await;
        let released = session.close().await;

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release_err)) => Err(release_err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release_err)) => {
                warn!(error = %release_err, "session release failed after unit of work error");
                Err(err)
            }
        }
    }
}
