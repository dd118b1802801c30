//! Canned call-log records for the suites.

use pulse_core::log::ApiCallRecord;
use serde_json::json;
use uuid::Uuid;

/// A unique per-test name so suites against a reused database can count
/// only their own rows.
pub fn unique_test_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// A fully populated record, as produced for a successful call.
pub fn call_record(test_name: &str) -> ApiCallRecord {
    ApiCallRecord {
        test_name: Some(test_name.to_string()),
        endpoint: "/users".to_string(),
        method: "GET".to_string(),
        request_headers: Some(json!({ "accept": "application/json" })),
        request_body: None,
        response_status: Some(200),
        response_headers: Some(json!({ "content-type": "application/json" })),
        response_body: Some(json!({ "users": [], "total": 0, "skip": 0, "limit": 5 })),
        execution_time_ms: Some(123),
    }
}

/// A record for an errored call: response fields absent.
pub fn failed_call_record(test_name: &str) -> ApiCallRecord {
    ApiCallRecord {
        test_name: Some(test_name.to_string()),
        endpoint: "/auth/login".to_string(),
        method: "POST".to_string(),
        request_body: Some(json!({ "username": "nobody", "password": "wrong" })),
        execution_time_ms: Some(45),
        ..Default::default()
    }
}
