//! Error types for Pulse.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Container errors
    #[error("Container runtime error: {0}")]
    Container(String),

    #[error("Container creation failed: {0}")]
    ContainerCreation(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database not initialized")]
    DatabaseNotInitialized,

    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    // HTTP errors
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // Infrastructure errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
