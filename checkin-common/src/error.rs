//! Common error types for the check-in service

use thiserror::Error;

/// Common result type for check-in operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the check-in crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid submission or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend refused or failed a write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// True for errors caused by the submitter rather than the server
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }
}
