//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading bootstrap config or resolving a declaration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the bootstrap config file
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse the bootstrap TOML
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Declaration is not valid JSON for its class models
    #[error("invalid declaration: {0}")]
    Json(#[from] serde_json::Error),

    /// Declaration rejected by validation
    #[error("validation error at '{location}': {message}")]
    Validation {
        /// Dotted path of the offending object
        location: String,
        /// What went wrong
        message: String,
    },

    /// Top-level key that is neither a control nor a recognized object
    #[error("validation error at '{location}': additionalProperties not allowed")]
    AdditionalProperties {
        /// The unknown key
        location: String,
    },

    /// Two expanded components ended up with the same id
    #[error("duplicate component id '{id}'")]
    DuplicateId {
        /// The colliding id
        id: String,
    },

    /// A declaration tried to change the class of an existing object
    #[error("cannot override class of '{id}': '{current}' -> '{requested}'")]
    ClassOverride {
        /// Component id
        id: String,
        /// Class in the running configuration
        current: String,
        /// Class in the new declaration
        requested: String,
    },

    /// A reference points at an object that does not exist
    #[error("'{location}' references unknown {kind} '{target}'")]
    UnknownReference {
        /// Dotted path of the referencing object
        location: String,
        /// What kind of object was expected
        kind: &'static str,
        /// The missing name
        target: String,
    },
}

impl ConfigError {
    /// Create a Validation error
    pub fn validation(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create an AdditionalProperties error
    pub fn additional_properties(location: impl Into<String>) -> Self {
        Self::AdditionalProperties {
            location: location.into(),
        }
    }

    /// Create an UnknownReference error
    pub fn unknown_reference(
        location: impl Into<String>,
        kind: &'static str,
        target: impl Into<String>,
    ) -> Self {
        Self::UnknownReference {
            location: location.into(),
            kind,
            target: target.into(),
        }
    }
}
