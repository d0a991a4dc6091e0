//! Error types for cache operations

use thiserror::Error;

/// Main error type for all cache operations
///
/// Query failures are stored in the cache entry and handed to every
/// subscriber, so the type is `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Transport failure (connection refused, reset, DNS, ...)
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded its deadline
    #[error("request timed out")]
    Timeout,

    /// Non-2xx status with the server-supplied message
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Response body did not match the expected envelope or shape
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid registration or construction, raised at startup only
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Local storage read or write failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Caller supplied an invalid value
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Build a server error from a status code and message
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        CacheError::Server {
            status,
            message: message.into(),
        }
    }

    /// True for 404/410 server responses: the resource is gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Server { status: 404 | 410, .. })
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::Network(_) => "network",
            CacheError::Timeout => "timeout",
            CacheError::Server { .. } => "server",
            CacheError::Decode(_) => "decode",
            CacheError::Configuration(_) => "configuration",
            CacheError::Storage(_) => "storage",
            CacheError::InvalidInput(_) => "invalid_input",
            CacheError::InvalidState(_) => "invalid_state",
            CacheError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Decode(err.to_string())
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
