//! Database container lifecycle management for Pulse.
//!
//! Finds, marks, verifies, or creates the disposable PostgreSQL container
//! that backs the call-logging path, talking to the Docker Engine API
//! through bollard. All raw Docker model handling is isolated in
//! [`discovery`]; the lifecycle logic only sees typed values.

pub mod discovery;
pub mod lifecycle;

pub use lifecycle::{ContainerHandle, PostgresLifecycle};
