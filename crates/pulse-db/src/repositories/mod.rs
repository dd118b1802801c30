//! PostgreSQL repository implementations.

mod api_log;

pub use api_log::PgApiLogRepository;
