//! Pulse Core
//!
//! Shared vocabulary for the Pulse API test harness: error handling,
//! environment-driven configuration, and the call-log data model used
//! across all other crates.

pub mod config;
pub mod error;
pub mod log;
pub mod ports;

pub use error::{Error, Result};
