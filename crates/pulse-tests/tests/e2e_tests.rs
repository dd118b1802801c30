//! End-to-end scenarios: mock API, real Postgres logging, full harness.
//!
//! Run with: `cargo test -p pulse-tests --test e2e_tests --features integration`

#![cfg(feature = "integration")]

use pulse_client::RequestOptions;
use pulse_client::models::{ApiErrorBody, UserPage};
use pulse_core::config;
use pulse_tests::TestRun;
use pulse_tests::fixtures::unique_test_name;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static ENV_LOCK: Mutex<()> = Mutex::new(());

const LOG_WAIT: Duration = Duration::from_secs(5);

fn enable_call_logging() {
    unsafe { std::env::set_var(config::ENV_LOG_API_CALLS, "true") };
}

#[tokio::test]
async fn user_listing_is_logged_once() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    enable_call_logging();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [
                {"id": 1, "username": "emilys"},
                {"id": 2, "username": "michaelw"}
            ],
            "total": 208, "skip": 0, "limit": 5
        })))
        .mount(&server)
        .await;

    let run = TestRun::setup_with_base_url(&server.uri())
        .await
        .expect("Setup failed");

    let name = unique_test_name("scenario-users");
    let response = run
        .client
        .list_users(Some(5), None, RequestOptions::new().test_name(&name))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 200);
    let page: UserPage = response.json().unwrap();
    assert!(page.users.len() <= 5);

    let logs = run
        .wait_for_logs(&name, 1, LOG_WAIT)
        .await
        .expect("Log row missing");
    assert_eq!(logs.len(), 1, "exactly one row per call");
    assert_eq!(logs[0].method, "GET");
    assert_eq!(logs[0].endpoint, "/users");
    assert_eq!(logs[0].response_status, Some(200));
    assert!(logs[0].execution_time_ms.is_some());

    run.teardown().await.expect("Teardown failed");
}

#[tokio::test]
async fn failed_login_is_logged_with_status_400() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    enable_call_logging();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    let run = TestRun::setup_with_base_url(&server.uri())
        .await
        .expect("Setup failed");

    let name = unique_test_name("scenario-login");
    let response = run
        .client
        .login("nobody", "wrong", RequestOptions::new().test_name(&name))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 400);
    let body: ApiErrorBody = response.json().unwrap();
    assert!(!body.message.is_empty());

    let logs = run
        .wait_for_logs(&name, 1, LOG_WAIT)
        .await
        .expect("Log row missing");
    assert_eq!(logs[0].response_status, Some(400));
    assert_eq!(logs[0].endpoint, "/auth/login");
    // The credentials that were sent are part of the record.
    assert_eq!(logs[0].request_body.as_ref().unwrap()["username"], "nobody");

    run.teardown().await.expect("Teardown failed");
}

#[tokio::test]
async fn transport_error_is_logged_without_response_fields() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    enable_call_logging();

    let run = TestRun::setup().await.expect("Setup failed");
    // Repoint at a dead port after setup so only the call itself fails.
    let dead_client = pulse_client::ApiClient::with_base_url(
        "http://127.0.0.1:1",
        Some(run.writer().expect("logging should be enabled")),
    )
    .expect("Client build failed");

    let name = unique_test_name("scenario-error");
    let result = dead_client
        .list_users(None, None, RequestOptions::new().test_name(&name))
        .await;
    assert!(result.is_err());

    let logs = run
        .wait_for_logs(&name, 1, LOG_WAIT)
        .await
        .expect("Log row missing");
    assert_eq!(logs[0].response_status, None);
    assert_eq!(logs[0].response_body, None);
    assert!(logs[0].execution_time_ms.is_some());

    run.teardown().await.expect("Teardown failed");
}
