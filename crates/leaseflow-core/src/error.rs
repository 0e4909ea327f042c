//! Error types for `leaseflow` core library.

use thiserror::Error;

/// Result type alias using `leaseflow` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `leaseflow` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A state transition would break the history invariants
    #[error("Invalid state history: {0}")]
    InvalidHistory(String),

    /// Deployment parameters rejected before submission
    #[error("Invalid deployment params: {0}")]
    Validation(String),

    /// Push message could not be decoded
    #[error("Failed to parse push message: {0}")]
    PushParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Global tracing subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
