//! Port traits between the core domain and storage adapters.

use crate::Result;
use crate::log::{ApiCallLog, ApiCallRecord};
use async_trait::async_trait;

/// Append-only store for API call logs.
#[async_trait]
pub trait ApiLogRepository: Send + Sync {
    /// Append one record, returning the generated row id.
    async fn insert(&self, record: &ApiCallRecord) -> Result<i64>;

    /// Fetch a row by id.
    async fn get(&self, id: i64) -> Result<Option<ApiCallLog>>;

    /// Most recent rows, newest first.
    async fn recent(&self, limit: u32) -> Result<Vec<ApiCallLog>>;

    /// Count rows matching a method/endpoint pair, optionally narrowed by
    /// response status.
    async fn count_matching(
        &self,
        method: &str,
        endpoint: &str,
        status: Option<i32>,
    ) -> Result<i64>;
}
