//! Connection pool and per-request database context.
//!
//! [`Database`] owns the pool. Each logical request creates its own
//! [`DbContext`] with [`Database::context`] and passes it by `&mut` down the
//! call chain. The context carries the request's active transaction, so every
//! query issued through it inside [`DbContext::transaction`] runs on the same
//! connection, while two requests never share one.

use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Postgres, Transaction};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::{
    config::Config,
    error::{Error, Result},
    models::records::{Record, SqlParam},
    queries::codec::{bind_params, column_names, row_to_record, row_to_values},
};

/// Database connection pool type
pub type DbPool = sqlx::PgPool;

/// Database connection type - supports both pool connections and transactions
pub type DbConn = sqlx::PgConnection;

/// Minimum number of pooled connections kept open.
pub const POOL_MIN_CONNECTIONS: u32 = 5;
/// Maximum number of pooled connections.
pub const POOL_MAX_CONNECTIONS: u32 = 20;
/// How long a caller waits for a free connection.
pub const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLSTATE `cannot_connect_now`: the server is starting up.
const SQLSTATE_CANNOT_CONNECT_NOW: &str = "57P03";

/// Handle to the process-wide connection pool.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Database {
    url: SecretString,
    pool: Arc<RwLock<Option<DbPool>>>,
}

/// How a failed pool creation attempt is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The server accepts connections but is still starting.
    NotReady,
    /// Network, TLS or pool level failure.
    Connection,
    /// Anything else (bad credentials, misconfiguration, ...).
    Unexpected,
}

impl ConnectFailure {
    pub fn classify(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(db)
                if db.code().as_deref() == Some(SQLSTATE_CANNOT_CONNECT_NOW) =>
            {
                ConnectFailure::NotReady
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => ConnectFailure::Connection,
            _ => ConnectFailure::Unexpected,
        }
    }
}

impl Database {
    /// Builds an uninitialized handle; no connection is attempted.
    pub fn new(config: &Config) -> Self {
        Self::from_url(config.database_url())
    }

    pub fn from_url(url: SecretString) -> Self {
        Self {
            url,
            pool: Arc::new(RwLock::new(None)),
        }
    }

    /// Wraps an already connected pool.
    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            url: SecretString::from(String::new()),
            pool: Arc::new(RwLock::new(Some(pool))),
        }
    }

    /// Creates the pool, retrying up to `retries` times with `delay` between
    /// attempts.
    pub async fn initialize(&self, retries: u32, delay: Duration) -> Result<()> {
        let retries = retries.max(1);

        for attempt in 1..=retries {
            match self.connect().await {
                Ok(pool) => {
                    *self.pool.write().unwrap_or_else(|e| e.into_inner()) = Some(pool);
                    tracing::info!(attempt, "Database pool initialized.");
                    return Ok(());
                }
                Err(e) => match ConnectFailure::classify(&e) {
                    ConnectFailure::NotReady => tracing::warn!(
                        attempt,
                        retries,
                        "Database is not ready yet: {}",
                        e
                    ),
                    ConnectFailure::Connection => tracing::error!(
                        attempt,
                        retries,
                        "Failed to connect to database: {}",
                        e
                    ),
                    ConnectFailure::Unexpected => tracing::error!(
                        attempt,
                        retries,
                        "Unexpected error while initializing database pool: {}",
                        e
                    ),
                },
            }

            if attempt < retries {
                tokio::time::sleep(delay).await;
            }
        }

        Err(Error::Internal(format!(
            "Could not initialize database pool after {} attempts",
            retries
        )))
    }

    async fn connect(&self) -> std::result::Result<DbPool, sqlx::Error> {
        PgPoolOptions::new()
            .min_connections(POOL_MIN_CONNECTIONS)
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
            .connect(self.url.expose_secret())
            .await
    }

    /// Closes the pool. Does nothing when it was never initialized.
    pub async fn close(&self) {
        let pool = self.pool.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(pool) = pool {
            pool.close().await;
            tracing::info!("Database pool closed.");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// The live pool, or an error when `initialize` has not succeeded.
    pub fn pool(&self) -> Result<DbPool> {
        self.pool
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| Error::Internal("Database pool is not initialized".to_string()))
    }

    /// A fresh per-request context with no active transaction.
    pub fn context(&self) -> DbContext {
        DbContext {
            db: self.clone(),
            tx: None,
            depth: 0,
            failed: false,
        }
    }

    /// Runs a read query on a fresh context.
    pub async fn select(&self, query: &str, params: Vec<SqlParam>) -> Result<Vec<Record>> {
        self.context().select(query, params).await
    }

    /// Runs a write query on a fresh context.
    pub async fn commit(&self, query: &str, params: Vec<SqlParam>) -> Result<Option<Record>> {
        self.context().commit(query, params).await
    }
}

/// Connection a single query runs on.
enum Conn<'a> {
    Pooled(PoolConnection<Postgres>),
    Scoped(&'a mut DbConn),
}

impl Deref for Conn<'_> {
    type Target = DbConn;

    fn deref(&self) -> &DbConn {
        match self {
            Conn::Pooled(conn) => &**conn,
            Conn::Scoped(conn) => &**conn,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut DbConn {
        match self {
            Conn::Pooled(conn) => &mut **conn,
            Conn::Scoped(conn) => &mut **conn,
        }
    }
}

/// Per-request database context.
///
/// Holds the request's transaction while one is open. Dropping the context
/// with a transaction still open rolls it back.
pub struct DbContext {
    db: Database,
    tx: Option<Transaction<'static, Postgres>>,
    depth: usize,
    /// A statement failed inside the open transaction, so Postgres will only
    /// roll it back.
    failed: bool,
}

impl DbContext {
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Nesting level of the current transaction scope, 0 outside of one.
    pub fn depth(&self) -> usize {
        self.depth
    }

    async fn acquire(&mut self) -> Result<Conn<'_>> {
        if let Some(tx) = self.tx.as_mut() {
            return Ok(Conn::Scoped(&mut **tx));
        }

        let pool = self.db.pool()?;
        let conn = pool.acquire().await.map_err(|e| {
            tracing::error!("Failed to acquire database connection: {}", e);
            Error::Sqlx(e)
        })?;
        Ok(Conn::Pooled(conn))
    }

    fn query_failed(&mut self, kind: &str, error: sqlx::Error) -> Error {
        tracing::error!("{} error: {}", kind, error);
        if self.tx.is_some() {
            self.failed = true;
        }
        Error::Database(error.to_string())
    }

    /// Executes a read query and returns each row as a record.
    pub async fn select(&mut self, query: &str, params: Vec<SqlParam>) -> Result<Vec<Record>> {
        tracing::debug!(query, "select");
        let result = {
            let mut conn = self.acquire().await?;
            bind_params(sqlx::query(query), params)
                .fetch_all(&mut *conn)
                .await
        };
        let rows = result.map_err(|e| self.query_failed("Select", e))?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    /// Executes a read query and returns column names plus positional rows.
    pub async fn select_rows(
        &mut self,
        query: &str,
        params: Vec<SqlParam>,
    ) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        tracing::debug!(query, "select_rows");
        let result = {
            let mut conn = self.acquire().await?;
            bind_params(sqlx::query(query), params)
                .fetch_all(&mut *conn)
                .await
        };
        let rows = result.map_err(|e| self.query_failed("Select", e))?;

        let columns = rows.first().map(column_names).unwrap_or_default();
        Ok((columns, rows.iter().map(row_to_values).collect()))
    }

    /// Executes a write query (INSERT, UPDATE, DELETE).
    ///
    /// When the statement has a `RETURNING` clause the first returned row is
    /// handed back; otherwise the result is `None`.
    pub async fn commit(&mut self, query: &str, params: Vec<SqlParam>) -> Result<Option<Record>> {
        tracing::debug!(query, "commit");
        let returning = has_returning(query);
        let result = {
            let mut conn = self.acquire().await?;
            let bound = bind_params(sqlx::query(query), params);

            if returning {
                bound
                    .fetch_optional(&mut *conn)
                    .await
                    .map(|row| row.as_ref().map(row_to_record))
            } else {
                bound.execute(&mut *conn).await.map(|_| None)
            }
        };

        result.map_err(|e| self.query_failed("Commit", e))
    }

    /// Runs `f` inside a transaction scope.
    ///
    /// If this context already has an open transaction, `f` joins it and the
    /// outermost scope decides the outcome. Otherwise a transaction is begun,
    /// committed when `f` returns `Ok` and rolled back when it returns `Err`.
    /// If a statement failed inside the scope and `f` still returned `Ok`,
    /// the transaction is rolled back and an error returned. The context's
    /// transaction slot is cleared on every path.
    ///
    /// ```no_run
    /// # async fn demo(db: crudbase::Database) -> crudbase::error::Result<()> {
    /// let mut ctx = db.context();
    /// ctx.transaction(|ctx| {
    ///     Box::pin(async move {
    ///         ctx.commit("UPDATE counters SET n = n + 1", vec![]).await?;
    ///         Ok(())
    ///     })
    /// })
    /// .await
    /// # }
    /// ```
    pub async fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut DbContext) -> BoxFuture<'c, Result<T>> + Send,
        T: Send,
    {
        if self.tx.is_some() {
            self.depth += 1;
            let result = f(self).await;
            self.depth -= 1;
            return result;
        }

        let pool = self.db.pool()?;
        let tx = pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin transaction: {}", e);
            Error::Sqlx(e)
        })?;
        self.tx = Some(tx);
        self.depth = 1;
        self.failed = false;

        let result = f(self).await;

        let tx = self.tx.take();
        self.depth = 0;
        let failed = std::mem::take(&mut self.failed);

        let Some(tx) = tx else {
            return result;
        };

        let result = match result {
            Ok(_) if failed => {
                tracing::warn!("Rolling back transaction aborted by a failed statement");
                Err(Error::Database(
                    "Transaction aborted by an earlier failed statement".to_string(),
                ))
            }
            other => other,
        };

        match result {
            Ok(value) => {
                tx.commit().await.map_err(|e| {
                    tracing::error!("Failed to commit transaction: {}", e);
                    Error::Sqlx(e)
                })?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Failed to roll back transaction: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

/// Whether the statement text contains the `RETURNING` keyword.
pub fn has_returning(query: &str) -> bool {
    query
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|token| token.eq_ignore_ascii_case("returning"))
}
