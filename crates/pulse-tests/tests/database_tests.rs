//! Pool manager and repository tests against a throwaway Postgres.
//!
//! Run with: `cargo test -p pulse-tests --test database_tests --features integration`

#![cfg(feature = "integration")]

use pulse_core::config::{self, DbSettings};
use pulse_core::ports::ApiLogRepository;
use pulse_db::{ApiLogWorker, Database, PgApiLogRepository};
use pulse_tests::fixtures::{call_record, failed_call_record, unique_test_name};
use sqlx::Row;
use std::sync::Mutex;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

// DbSettings reads process-wide environment; tests that repoint it must
// not interleave.
static ENV_LOCK: Mutex<()> = Mutex::new(());

async fn start_postgres() -> ContainerAsync<Postgres> {
    pulse_tests::init_test_logging();
    let container = Postgres::default()
        .with_tag("16-alpine")
        .start()
        .await
        .expect("Failed to start postgres container");

    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to resolve host port");

    unsafe {
        std::env::set_var(config::ENV_DB_HOST, "localhost");
        std::env::set_var(config::ENV_DB_NAME, "postgres");
        std::env::set_var(config::ENV_DB_USER, "postgres");
        std::env::set_var(config::ENV_DB_PASSWORD, "postgres");
    }
    config::publish_db_port(port);
    config::clear_db_ready();

    container
}

#[tokio::test]
async fn ready_flag_follows_initialize_and_close() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _container = start_postgres().await;

    let db = Database::new();
    assert!(!db.is_ready().await);

    db.initialize().await.expect("Failed to initialize");
    assert!(db.is_ready().await);

    // Idempotent.
    db.initialize().await.expect("Second initialize must no-op");

    db.close().await;
    assert!(!db.is_ready().await);

    // Safe when already closed.
    db.close().await;
}

#[tokio::test]
async fn concurrent_initialize_converges_on_one_pool() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _container = start_postgres().await;

    let db = Database::new();
    let (a, b) = tokio::join!(db.initialize(), db.initialize());
    a.expect("First initializer failed");
    b.expect("Second initializer failed");
    assert!(db.is_ready().await);

    db.close().await;
}

#[tokio::test]
async fn call_log_round_trip() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _container = start_postgres().await;

    let db = Database::new();
    db.initialize().await.expect("Failed to initialize");
    let repository =
        PgApiLogRepository::new(db.pool().await.unwrap(), &DbSettings::from_env().schema);

    let record = call_record(&unique_test_name("round-trip"));
    let id = repository.insert(&record).await.expect("Insert failed");

    let log = repository
        .get(id)
        .await
        .expect("Fetch failed")
        .expect("Row not found");
    assert_eq!(log.test_name, record.test_name);
    assert_eq!(log.endpoint, record.endpoint);
    assert_eq!(log.method, record.method);
    assert_eq!(log.response_status, record.response_status);
    assert_eq!(log.execution_time_ms, record.execution_time_ms);
    assert_eq!(log.request_headers, record.request_headers);
    assert_eq!(log.response_headers, record.response_headers);
    assert_eq!(log.response_body, record.response_body);

    // Errored calls persist with response fields absent.
    let failed = failed_call_record(&unique_test_name("round-trip-failed"));
    let failed_id = repository.insert(&failed).await.expect("Insert failed");
    let failed_log = repository.get(failed_id).await.unwrap().unwrap();
    assert_eq!(failed_log.response_status, None);
    assert_eq!(failed_log.response_body, None);

    db.close().await;
}

#[tokio::test]
async fn query_binds_positional_parameters() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _container = start_postgres().await;

    let db = Database::new();
    db.initialize().await.expect("Failed to initialize");
    let schema = DbSettings::from_env().schema;
    let repository = PgApiLogRepository::new(db.pool().await.unwrap(), &schema);

    let name = unique_test_name("raw-query");
    repository.insert(&call_record(&name)).await.unwrap();

    let sql = format!(
        "SELECT endpoint FROM {} WHERE test_name = $1 AND response_status = $2",
        pulse_db::schema::log_table(&schema)
    );
    let rows = db
        .query(&sql, &[name.as_str().into(), 200.into()])
        .await
        .expect("Query failed");
    assert_eq!(rows.len(), 1);
    let endpoint: String = rows[0].get("endpoint");
    assert_eq!(endpoint, "/users");

    db.close().await;
}

#[tokio::test]
async fn count_matching_narrows_by_status() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _container = start_postgres().await;

    let db = Database::new();
    db.initialize().await.expect("Failed to initialize");
    let repository =
        PgApiLogRepository::new(db.pool().await.unwrap(), &DbSettings::from_env().schema);

    // An endpoint unique to this test keeps the counts exact even
    // against a database shared across runs.
    let endpoint = format!("/users/{}", unique_test_name("count"));

    let mut ok = call_record(&unique_test_name("count-ok"));
    ok.endpoint = endpoint.clone();
    repository.insert(&ok).await.unwrap();

    let mut bad = call_record(&unique_test_name("count-bad"));
    bad.endpoint = endpoint.clone();
    bad.response_status = Some(404);
    repository.insert(&bad).await.unwrap();

    let all = repository
        .count_matching("GET", &endpoint, None)
        .await
        .unwrap();
    assert_eq!(all, 2);
    let only_ok = repository
        .count_matching("GET", &endpoint, Some(200))
        .await
        .unwrap();
    assert_eq!(only_ok, 1);

    db.close().await;
}

#[tokio::test]
async fn writer_drains_queue_on_shutdown() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _container = start_postgres().await;

    let db = Database::new();
    db.initialize().await.expect("Failed to initialize");

    let name = unique_test_name("drain");
    let worker = ApiLogWorker::spawn(db.clone());
    let writer = worker.writer();
    for _ in 0..3 {
        writer.log(call_record(&name));
    }
    worker.shutdown().await;

    let repository =
        PgApiLogRepository::new(db.pool().await.unwrap(), &DbSettings::from_env().schema);
    let matching = repository
        .recent(50)
        .await
        .unwrap()
        .into_iter()
        .filter(|log| log.test_name.as_deref() == Some(name.as_str()))
        .count();
    assert_eq!(matching, 3);

    db.close().await;
}
