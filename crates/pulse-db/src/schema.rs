//! Call-log schema setup.
//!
//! The schema name comes from the environment and is interpolated into
//! DDL text, so it is validated against a strict identifier charset
//! first; anything else falls back to the default schema.

use pulse_core::config::DEFAULT_SCHEMA;
use pulse_core::{Error, Result};
use sqlx::PgPool;
use tracing::{info, warn};

/// True for simple SQL identifiers: a letter or underscore followed by
/// letters, digits, or underscores.
pub fn valid_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The configured schema name, or the default when it is not a safe
/// identifier.
pub fn schema_or_default(name: &str) -> &str {
    if valid_ident(name) {
        name
    } else {
        warn!(schema = %name, "Invalid schema name, using default");
        DEFAULT_SCHEMA
    }
}

/// Schema-qualified `api_logs` table name.
pub fn log_table(schema: &str) -> String {
    format!("{}.api_logs", schema_or_default(schema))
}

/// Create the schema, the append-only `api_logs` table, and its indexes.
/// Everything is `IF NOT EXISTS`; re-running is harmless.
pub async fn ensure(pool: &PgPool, schema: &str) -> Result<()> {
    let schema = schema_or_default(schema);
    let table = format!("{}.api_logs", schema);

    let statements = [
        format!("CREATE SCHEMA IF NOT EXISTS {}", schema),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                test_name TEXT,
                endpoint TEXT NOT NULL,
                method TEXT NOT NULL,
                request_headers JSONB,
                request_body JSONB,
                response_status INT,
                response_headers JSONB,
                response_body JSONB,
                execution_time_ms BIGINT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
            table
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_api_logs_method ON {} (method)",
            table
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_api_logs_endpoint ON {} (endpoint)",
            table
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_api_logs_created_at ON {} (created_at DESC)",
            table
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_api_logs_test_name ON {} (test_name)",
            table
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_api_logs_response_status ON {} (response_status)",
            table
        ),
    ];

    for statement in &statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| Error::SchemaSetup(e.to_string()))?;
    }

    info!(schema = %schema, "Call-log schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_validation() {
        assert!(valid_ident("api_testing"));
        assert!(valid_ident("_private"));
        assert!(valid_ident("s1"));
        assert!(!valid_ident(""));
        assert!(!valid_ident("1start"));
        assert!(!valid_ident("bad-name"));
        assert!(!valid_ident("drop table; --"));
    }

    #[test]
    fn invalid_schema_falls_back_to_default() {
        assert_eq!(schema_or_default("logs"), "logs");
        assert_eq!(schema_or_default("x; DROP SCHEMA"), DEFAULT_SCHEMA);
        assert_eq!(log_table("logs"), "logs.api_logs");
        assert_eq!(
            log_table("not valid"),
            format!("{}.api_logs", DEFAULT_SCHEMA)
        );
    }
}
