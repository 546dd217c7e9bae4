//! Source error types

use thiserror::Error;

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors from receivers and listeners
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to bind a socket
    #[error("failed to bind {protocol} {address}: {source}")]
    Bind {
        /// `tcp`, `udp` or `udp6`
        protocol: &'static str,
        /// The bind address
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an established socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The receiver exhausted its restart budget
    #[error("receiver on port {port} destroyed after {attempts} restart attempts")]
    RestartBudgetExhausted {
        /// The port the receiver served
        port: u16,
        /// How many attempts were made
        attempts: u32,
    },

    /// A state transition that the receiver state machine forbids
    #[error("invalid receiver state transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: crate::state::ReceiverState,
        to: crate::state::ReceiverState,
    },

    /// Record channel to the pipeline closed
    #[error("record channel closed")]
    ChannelClosed,

    /// No receiver is running on the port
    #[error("no receiver on port {port}")]
    UnknownPort {
        /// The missing port
        port: u16,
    },
}
