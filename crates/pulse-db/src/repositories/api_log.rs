//! PostgreSQL implementation of ApiLogRepository.

use crate::schema;
use async_trait::async_trait;
use pulse_core::log::{ApiCallLog, ApiCallRecord};
use pulse_core::ports::ApiLogRepository;
use pulse_core::{Error, Result};
use sqlx::{PgPool, Row};

/// PostgreSQL implementation of ApiLogRepository.
pub struct PgApiLogRepository {
    pool: PgPool,
    table: String,
}

impl PgApiLogRepository {
    /// Create a repository bound to the given schema's `api_logs` table.
    pub fn new(pool: PgPool, schema: &str) -> Self {
        Self {
            pool,
            table: schema::log_table(schema),
        }
    }

    fn row_to_log(r: &sqlx::postgres::PgRow) -> ApiCallLog {
        ApiCallLog {
            id: r.get("id"),
            test_name: r.get("test_name"),
            endpoint: r.get("endpoint"),
            method: r.get("method"),
            request_headers: r.get("request_headers"),
            request_body: r.get("request_body"),
            response_status: r.get("response_status"),
            response_headers: r.get("response_headers"),
            response_body: r.get("response_body"),
            execution_time_ms: r.get("execution_time_ms"),
            created_at: r.get("created_at"),
        }
    }

    const COLUMNS: &'static str = "id, test_name, endpoint, method, request_headers, \
        request_body, response_status, response_headers, response_body, \
        execution_time_ms, created_at";
}

#[async_trait]
impl ApiLogRepository for PgApiLogRepository {
    async fn insert(&self, record: &ApiCallRecord) -> Result<i64> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO {} (test_name, endpoint, method, request_headers, request_body,
                response_status, response_headers, response_body, execution_time_ms)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id"#,
            self.table
        ))
        .bind(&record.test_name)
        .bind(&record.endpoint)
        .bind(&record.method)
        .bind(&record.request_headers)
        .bind(&record.request_body)
        .bind(record.response_status)
        .bind(&record.response_headers)
        .bind(&record.response_body)
        .bind(record.execution_time_ms)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.get("id"))
    }

    async fn get(&self, id: i64) -> Result<Option<ApiCallLog>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            Self::COLUMNS,
            self.table
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.as_ref().map(Self::row_to_log))
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ApiCallLog>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} ORDER BY created_at DESC LIMIT $1",
            Self::COLUMNS,
            self.table
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(rows.iter().map(Self::row_to_log).collect())
    }

    async fn count_matching(
        &self,
        method: &str,
        endpoint: &str,
        status: Option<i32>,
    ) -> Result<i64> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM {} \
             WHERE method = $1 AND endpoint = $2 \
             AND ($3::int IS NULL OR response_status = $3)",
            self.table
        ))
        .bind(method)
        .bind(endpoint)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.get("total"))
    }
}
