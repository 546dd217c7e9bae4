//! Poller error types

use thiserror::Error;

/// Result type for poller operations
pub type Result<T> = std::result::Result<T, PollerError>;

/// Errors from poll cycles
///
/// These stay inside the poller subsystem: a failing cycle is logged and the
/// next tick tries again (TransientIOError semantics).
#[derive(Debug, Error)]
pub enum PollerError {
    /// The component handed to the poller was not a system poller
    #[error("component '{id}' is not a system poller")]
    NotAPoller {
        /// The component id
        id: String,
    },

    /// Credentials could not be decrypted
    #[error("credential error: {0}")]
    Credentials(#[from] tstream_vault::VaultError),

    /// An endpoint request failed
    #[error("endpoint '{path}' failed: {source}")]
    Endpoint {
        /// The endpoint path
        path: String,
        #[source]
        source: tstream_http::HttpError,
    },

    /// An endpoint answered with a body that is not JSON
    #[error("endpoint '{path}' returned a non-JSON body")]
    InvalidBody {
        /// The endpoint path
        path: String,
    },

    /// Record channel to the pipeline closed
    #[error("record channel closed")]
    ChannelClosed,
}
