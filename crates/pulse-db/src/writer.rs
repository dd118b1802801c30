//! Background writer for API call logs.
//!
//! Logging is best-effort by contract: it must never block the HTTP call
//! it describes and never surface an error to the test that issued it.
//! Records go into a bounded queue drained by one worker task; a full
//! queue, a missing pool, or a failed insert all degrade to a `debug!`
//! diagnostic and a dropped record.

use crate::{Database, PgApiLogRepository};
use pulse_core::config::DbSettings;
use pulse_core::log::ApiCallRecord;
use pulse_core::ports::ApiLogRepository;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const QUEUE_CAPACITY: usize = 256;

/// Non-blocking, infallible handle for enqueueing call logs.
#[derive(Clone)]
pub struct ApiLogWriter {
    tx: mpsc::Sender<ApiCallRecord>,
}

impl ApiLogWriter {
    /// Enqueue one record. Never blocks, never fails: when the queue is
    /// full or the worker is gone the record is dropped.
    pub fn log(&self, record: ApiCallRecord) {
        if let Err(e) = self.tx.try_send(record) {
            debug!(error = %e, "Dropping api log record");
        }
    }
}

/// Owns the drain task for the call-log queue.
pub struct ApiLogWorker {
    tx: mpsc::Sender<ApiCallRecord>,
    handle: JoinHandle<()>,
}

impl ApiLogWorker {
    /// Spawn the drain task against the given database.
    pub fn spawn(db: Database) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(drain(db, rx));
        Self { tx, handle }
    }

    /// A cheap handle for producers.
    pub fn writer(&self) -> ApiLogWriter {
        ApiLogWriter {
            tx: self.tx.clone(),
        }
    }

    /// Close the queue and wait for already-enqueued records to be
    /// written out.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.handle.await;
    }
}

async fn drain(db: Database, mut rx: mpsc::Receiver<ApiCallRecord>) {
    while let Some(record) = rx.recv().await {
        if !db.is_ready().await {
            debug!(endpoint = %record.endpoint, "Database not ready, dropping api log");
            continue;
        }
        let Ok(pool) = db.pool().await else {
            continue;
        };
        let repository = PgApiLogRepository::new(pool, &DbSettings::from_env().schema);
        match repository.insert(&record).await {
            Ok(id) => {
                debug!(id, method = %record.method, endpoint = %record.endpoint, "Logged api call")
            }
            Err(e) => debug!(error = %e, "Api log insert failed"),
        }
    }
}
