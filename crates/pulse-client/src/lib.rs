//! Logging-enabled HTTP client for the API under test.
//!
//! Wraps outbound calls, times them, retries one transient transport
//! signature, and opportunistically persists each call through the
//! background log writer without ever affecting the call's outcome.

pub mod client;
pub mod endpoints;
pub mod models;

pub use client::{ApiClient, ApiResponse, RequestOptions};
