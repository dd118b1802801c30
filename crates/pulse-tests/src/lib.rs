//! Test infrastructure for Pulse.
//!
//! Provides the per-run [`TestRun`] harness (container start-or-reuse,
//! schema setup, log writer, request client) plus fixtures for the
//! suites under `tests/`.
//!
//! # Usage
//!
//! ```ignore
//! use pulse_tests::TestRun;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let run = TestRun::setup().await.unwrap();
//!     // Use run.client, run.db, ...
//!     run.teardown().await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod harness;

pub use harness::TestRun;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,pulse_db=debug,pulse_container=debug")),
        )
        .with_test_writer()
        .try_init();
}
