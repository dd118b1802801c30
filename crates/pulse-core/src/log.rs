//! The API call log data model.
//!
//! One row is appended per attempted HTTP call, including failed attempts
//! (response fields absent). Rows are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder stored when a payload cannot be serialized or decoded.
pub const UNSERIALIZABLE: &str = "<unserializable>";

/// A call-log row to be appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiCallRecord {
    pub test_name: Option<String>,
    pub endpoint: String,
    pub method: String,
    pub request_headers: Option<Value>,
    pub request_body: Option<Value>,
    pub response_status: Option<i32>,
    pub response_headers: Option<Value>,
    pub response_body: Option<Value>,
    pub execution_time_ms: Option<i64>,
}

/// A call-log row read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCallLog {
    pub id: i64,
    pub test_name: Option<String>,
    pub endpoint: String,
    pub method: String,
    pub request_headers: Option<Value>,
    pub request_body: Option<Value>,
    pub response_status: Option<i32>,
    pub response_headers: Option<Value>,
    pub response_body: Option<Value>,
    pub execution_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl ApiCallRecord {
    /// Start a record for one outbound call.
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }
}

/// Convert response headers into a JSON object, one string value per
/// header name. Undecodable values are replaced, never dropped.
pub fn headers_to_value(headers: &reqwest::header::HeaderMap) -> Value {
    let map: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            let v = value
                .to_str()
                .map(|s| Value::String(s.to_string()))
                .unwrap_or_else(|_| Value::String(UNSERIALIZABLE.to_string()));
            (name.as_str().to_string(), v)
        })
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

    #[test]
    fn headers_become_string_values() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("x-request-id", HeaderValue::from_static("abc-123"));

        let value = headers_to_value(&headers);
        assert_eq!(value["content-type"], "application/json");
        assert_eq!(value["x-request-id"], "abc-123");
    }

    #[test]
    fn non_utf8_header_values_get_placeholder() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-binary"),
            HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );

        let value = headers_to_value(&headers);
        assert_eq!(value["x-binary"], UNSERIALIZABLE);
    }

    #[test]
    fn record_defaults_leave_response_absent() {
        let record = ApiCallRecord::new("GET", "/users");
        assert_eq!(record.method, "GET");
        assert_eq!(record.endpoint, "/users");
        assert!(record.response_status.is_none());
        assert!(record.response_body.is_none());
        assert!(record.execution_time_ms.is_none());
    }
}
