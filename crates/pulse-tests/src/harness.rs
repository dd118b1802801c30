//! Per-run setup and teardown.
//!
//! Every service is constructed here and owned by the run: one container
//! lifecycle, one pool manager, one log worker, one client. Teardown
//! drains the log queue before the pool closes and honors the keep-alive
//! flag for the container.

use anyhow::Context;
use pulse_client::ApiClient;
use pulse_container::PostgresLifecycle;
use pulse_core::config::{DbSettings, RunSettings};
use pulse_core::log::ApiCallLog;
use pulse_core::ports::ApiLogRepository;
use pulse_db::{ApiLogWorker, Database, PgApiLogRepository};
use std::time::Duration;
use tracing::info;

/// Everything a test run needs, wired once in `setup`.
pub struct TestRun {
    pub db: Database,
    pub client: ApiClient,
    lifecycle: PostgresLifecycle,
    worker: Option<ApiLogWorker>,
}

impl TestRun {
    /// Start or reuse the database container, initialize the pool and
    /// schema, and build the request client. Fatal errors abort the run
    /// with troubleshooting context.
    pub async fn setup() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        crate::init_test_logging();

        let mut lifecycle =
            PostgresLifecycle::new().context("Could not reach Docker; is the daemon running?")?;
        let created = lifecycle
            .start()
            .await
            .context("Database container setup failed; check Docker and the postgres image")?;
        info!(created = created.is_some(), "Database container ready");

        let db = Database::new();
        db.initialize()
            .await
            .context("Database setup failed; check the PULSE_DB_* settings")?;

        let settings = RunSettings::from_env();
        let worker = settings
            .log_api_calls
            .then(|| ApiLogWorker::spawn(db.clone()));
        let client = ApiClient::new(worker.as_ref().map(|w| w.writer()))?;

        Ok(Self {
            db,
            client,
            lifecycle,
            worker,
        })
    }

    /// Like `setup`, but point the client at an explicit base URL (a mock
    /// server) instead of the configured one.
    pub async fn setup_with_base_url(base: &str) -> anyhow::Result<Self> {
        let mut run = Self::setup().await?;
        run.client = ApiClient::with_base_url(base, run.worker.as_ref().map(|w| w.writer()))?;
        Ok(run)
    }

    /// Drain the log queue, close the pool, stop the container (unless
    /// keep-alive is set or it was reused).
    pub async fn teardown(mut self) -> anyhow::Result<()> {
        if let Some(worker) = self.worker.take() {
            worker.shutdown().await;
        }
        self.db.close().await;
        self.lifecycle.stop().await?;
        Ok(())
    }

    /// The log writer handle, when call logging is enabled for this run.
    pub fn writer(&self) -> Option<pulse_db::ApiLogWriter> {
        self.worker.as_ref().map(|w| w.writer())
    }

    /// A repository over the run's pool.
    pub async fn repository(&self) -> anyhow::Result<PgApiLogRepository> {
        let pool = self.db.pool().await?;
        Ok(PgApiLogRepository::new(pool, &DbSettings::from_env().schema))
    }

    /// Poll the log table until `expected` rows carry `test_name`, or the
    /// timeout elapses. Returns the matching rows. Needed because the log
    /// path is a detached queue, not part of the request's control flow.
    pub async fn wait_for_logs(
        &self,
        test_name: &str,
        expected: usize,
        timeout: Duration,
    ) -> anyhow::Result<Vec<ApiCallLog>> {
        let repository = self.repository().await?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let matching: Vec<ApiCallLog> = repository
                .recent(100)
                .await?
                .into_iter()
                .filter(|log| log.test_name.as_deref() == Some(test_name))
                .collect();
            if matching.len() >= expected {
                return Ok(matching);
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!(
                    "expected {} log rows for {}, found {}",
                    expected,
                    test_name,
                    matching.len()
                );
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
