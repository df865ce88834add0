//! Error types for the drover client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the scheduler
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this is a transient scheduler failure: a network hiccup,
    /// a timeout, or a server-side (5xx) error.
    ///
    /// Transient failures are absorbed by the worker's poll loop and retried
    /// by the next scheduled poll; everything else indicates a request the
    /// scheduler will never accept.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(e) => e.is_connect() || e.is_timeout(),
            Self::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
