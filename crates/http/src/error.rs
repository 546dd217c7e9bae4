//! HTTP error types

use thiserror::Error;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, HttpError>;

/// Errors from outbound HTTP plumbing
#[derive(Debug, Error)]
pub enum HttpError {
    /// Client construction failed (TLS or proxy misconfiguration)
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// Request failed at the transport level
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("{context}: unexpected status {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// What was being requested
        context: String,
    },

    /// A token endpoint answered with an unusable body
    #[error("token response invalid: {0}")]
    TokenResponse(String),
}

impl HttpError {
    /// Create a Status error
    pub fn status(status: u16, context: impl Into<String>) -> Self {
        Self::Status {
            status,
            context: context.into(),
        }
    }
}
