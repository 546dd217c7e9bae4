//! Controller error types

use thiserror::Error;

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Control-plane errors, surfaced to the caller
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Declaration rejected; nothing was persisted
    #[error(transparent)]
    Validation(#[from] tstream_config::ConfigError),

    /// Namespace or object missing on lookup
    #[error("'{name}' not found in configuration")]
    ObjectNotFound {
        /// The missing namespace or object name
        name: String,
    },

    /// Declaration persistence failed
    #[error("storage error: {0}")]
    Storage(String),

    /// A debug facility was used while debug is disabled
    #[error("debug facilities are disabled")]
    DebugDisabled,

    /// An on-demand pull hit a poller that is not registered
    #[error("pull poller '{id}' is not available")]
    PollerUnavailable {
        /// The poller component id
        id: String,
    },

    /// Event injection targeted an unknown listener
    #[error(transparent)]
    Source(#[from] tstream_sources::SourceError),
}

impl ControllerError {
    /// Create an ObjectNotFound error
    pub fn object_not_found(name: impl Into<String>) -> Self {
        Self::ObjectNotFound { name: name.into() }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
