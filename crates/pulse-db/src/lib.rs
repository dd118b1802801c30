//! PostgreSQL layer for Pulse: the call-log connection pool, schema
//! setup, repositories, and the background log writer.

pub mod repositories;
pub mod schema;
pub mod writer;

pub use repositories::PgApiLogRepository;
pub use writer::{ApiLogWorker, ApiLogWriter};

use pulse_core::config::{self, DbSettings};
use pulse_core::{Error, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
/// A freshly started Postgres container accepts connections late; the
/// first connect is retried over roughly this window.
const CONNECT_ATTEMPTS: u32 = 30;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// A bind value for [`Database::query`]. Covers the types the call-log
/// table stores; `From` impls keep call sites terse.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<serde_json::Value> for SqlParam {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// Connection pool manager for the call-log database.
///
/// Cheap to clone (shared state); one instance per test run, injected by
/// the harness. Initialization is single-flight: the pool slot doubles as
/// the critical section, so concurrent first calls converge on one pool.
#[derive(Clone)]
pub struct Database {
    pool: Arc<Mutex<Option<PgPool>>>,
}

impl Database {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// Build the pool from the current environment, verify connectivity,
    /// and ensure the call-log schema exists. No-op when already
    /// initialized; failure propagates and leaves the manager
    /// uninitialized.
    pub async fn initialize(&self) -> Result<()> {
        let mut guard = self.pool.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let settings = DbSettings::from_env();
        info!(host = %settings.host, port = settings.port, database = %settings.database,
            "Initializing call-log database");

        let pool = Self::connect_with_retry(&settings).await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| Error::Database(format!("Connectivity check failed: {}", e)))?;

        schema::ensure(&pool, &settings.schema).await?;
        config::mark_db_ready();

        *guard = Some(pool);
        Ok(())
    }

    /// Whether a live pool exists.
    ///
    /// When the pool is missing but another component already ran schema
    /// setup in this process, a pool-only reconnect is attempted silently
    /// (no DDL) before answering.
    pub async fn is_ready(&self) -> bool {
        let mut guard = self.pool.lock().await;
        if guard.is_some() {
            return true;
        }
        if !config::db_marked_ready() {
            return false;
        }

        let settings = DbSettings::from_env();
        match Self::pool_options().connect(&settings.url()).await {
            Ok(pool) => {
                debug!("Re-created call-log pool from existing schema");
                *guard = Some(pool);
                true
            }
            Err(e) => {
                debug!(error = %e, "Call-log pool re-creation failed");
                false
            }
        }
    }

    /// Run a parameterized query; `params` bind to `$1`, `$2`, ... in
    /// order. Fails when not initialized.
    pub async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<PgRow>> {
        let pool = self.pool().await?;
        let mut query = sqlx::query(sql);
        for param in params {
            query = match param {
                SqlParam::Null => query.bind(None::<String>),
                SqlParam::Bool(v) => query.bind(*v),
                SqlParam::Int(v) => query.bind(*v),
                SqlParam::Float(v) => query.bind(*v),
                SqlParam::Text(v) => query.bind(v.clone()),
                SqlParam::Json(v) => query.bind(v.clone()),
            };
        }
        query
            .fetch_all(&pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Clone the live pool out for repository use. Fails when not
    /// initialized.
    pub async fn pool(&self) -> Result<PgPool> {
        self.pool
            .lock()
            .await
            .clone()
            .ok_or(Error::DatabaseNotInitialized)
    }

    /// Close the pool and mark the manager uninitialized. Safe to call
    /// when already closed.
    ///
    /// Clears the process-wide readiness marker, which mutates the
    /// environment. Per the contract on `config::clear_db_ready`, call
    /// this only from run teardown, after the worker tasks that read the
    /// environment have been shut down.
    pub async fn close(&self) {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
            info!("Call-log database pool closed");
        }
        config::clear_db_ready();
    }

    fn pool_options() -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(IDLE_TIMEOUT)
    }

    async fn connect_with_retry(settings: &DbSettings) -> Result<PgPool> {
        let url = settings.url();
        let mut last_error = String::new();
        for attempt in 1..=CONNECT_ATTEMPTS {
            match Self::pool_options().connect(&url).await {
                Ok(pool) => return Ok(pool),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < CONNECT_ATTEMPTS {
                        debug!(attempt, error = %last_error, "Database connect failed, retrying");
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }
        warn!(error = %last_error, "Database unreachable after retries");
        Err(Error::Database(format!(
            "Could not connect to {}:{}/{}: {}",
            settings.host, settings.port, settings.database, last_error
        )))
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
