//! The request client and its logging side channel.

use pulse_core::config::RunSettings;
use pulse_core::log::{ApiCallRecord, headers_to_value};
use pulse_core::{Error, Result};
use pulse_db::ApiLogWriter;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::warn;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(1);
/// Extra attempts for the one retryable transport signature.
const MAX_RETRIES: u32 = 2;
/// Hyper's wording when the server tears down a kept-alive connection
/// mid-request. The only transport error worth retrying; everything else
/// propagates untouched.
const TRANSIENT_DISCONNECT: &str = "connection closed before message completed";

const UNREADABLE_BODY: &str = "<unreadable body>";

/// Per-request options: query pairs, JSON body, extra headers, and the
/// test name recorded alongside the call log.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub test_name: Option<String>,
    pub query: Option<Vec<(String, String)>>,
    pub json: Option<Value>,
    pub headers: Option<HeaderMap>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        let headers = self.headers.get_or_insert_with(HeaderMap::new);
        if let Ok(value) = format!("Bearer {}", token).parse() {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        self
    }
}

/// A fully captured response: status, headers, and body bytes.
///
/// The body is read eagerly so the same response can be handed to the
/// caller and to the log writer.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl ApiResponse {
    async fn read(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.ok().map(|b| b.to_vec());
        Self {
            status,
            headers,
            body,
        }
    }

    /// Assemble a response from captured parts (useful in tests).
    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: Option<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body as lossy text; empty when the body could not be read.
    pub fn text(&self) -> String {
        self.body
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Deserialize the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| Error::Serialization("response body was not readable".to_string()))?;
        serde_json::from_slice(body).map_err(Into::into)
    }

    /// Body as a JSON value for logging: parsed JSON, else plain text,
    /// else a placeholder.
    pub fn body_value(&self) -> Value {
        match self.body.as_deref() {
            Some(bytes) => serde_json::from_slice(bytes).unwrap_or_else(|_| {
                match std::str::from_utf8(bytes) {
                    Ok(text) => Value::String(text.to_string()),
                    Err(_) => Value::String(UNREADABLE_BODY.to_string()),
                }
            }),
            None => Value::String(UNREADABLE_BODY.to_string()),
        }
    }
}

/// HTTP client for the API under test, with best-effort call logging.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    writer: Option<ApiLogWriter>,
}

impl ApiClient {
    /// Build against the configured base URL. `writer` is `None` when
    /// call logging is disabled for the run.
    pub fn new(writer: Option<ApiLogWriter>) -> Result<Self> {
        let settings = RunSettings::from_env();
        Self::with_base_url(&settings.base_url, writer)
    }

    /// Build against an explicit base URL.
    pub fn with_base_url(base: &str, writer: Option<ApiLogWriter>) -> Result<Self> {
        let base_url =
            Url::parse(base).map_err(|e| Error::InvalidUrl(format!("{}: {}", base, e)))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            writer,
        })
    }

    /// Issue one call and return the captured response.
    ///
    /// Only the kept-alive teardown signature is retried (bounded, fixed
    /// delay); every other error propagates immediately. Whatever the
    /// outcome, one log record is enqueued when logging is on (with
    /// response fields absent on error), and logging can never disturb
    /// the returned value.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let started = Instant::now();
        let mut attempt = 0u32;
        let outcome = loop {
            match self.send_once(&method, url.clone(), &options).await {
                Err(e) if is_transient_disconnect(&e) && attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(attempt, endpoint, error = %e, "Connection torn down mid-request, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                other => break other,
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(response) => {
                let response = ApiResponse::read(response).await;
                self.log_call(&method, endpoint, &options, Some(&response), elapsed_ms);
                Ok(response)
            }
            Err(e) => {
                self.log_call(&method, endpoint, &options, None, elapsed_ms);
                Err(e.into())
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: Url,
        options: &RequestOptions,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(query) = &options.query {
            request = request.query(query);
        }
        if let Some(headers) = &options.headers {
            request = request.headers(headers.clone());
        }
        if let Some(body) = &options.json {
            request = request.json(body);
        }
        request.send().await
    }

    fn log_call(
        &self,
        method: &Method,
        endpoint: &str,
        options: &RequestOptions,
        response: Option<&ApiResponse>,
        elapsed_ms: i64,
    ) {
        let Some(writer) = &self.writer else {
            return;
        };

        let mut record = ApiCallRecord::new(method.as_str(), endpoint);
        record.test_name = options.test_name.clone();
        record.request_headers = options.headers.as_ref().map(headers_to_value);
        record.request_body = options.json.clone();
        record.execution_time_ms = Some(elapsed_ms);
        if let Some(response) = response {
            record.response_status = Some(response.status().as_u16() as i32);
            record.response_headers = Some(headers_to_value(response.headers()));
            record.response_body = Some(response.body_value());
        }
        writer.log(record);
    }
}

fn is_transient_disconnect(err: &reqwest::Error) -> bool {
    chain_mentions(err, TRANSIENT_DISCONNECT)
}

fn chain_mentions(err: &(dyn std::error::Error + 'static), needle: &str) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if e.to_string().contains(needle) {
            return true;
        }
        current = e.source();
    }
    false
}
