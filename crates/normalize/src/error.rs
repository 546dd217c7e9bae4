//! Normalizer error types

use thiserror::Error;

/// Result type for normalizer operations
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Errors raised by normalizers
///
/// Normalizers only error on contract violations (wrong input shape, invalid
/// options); an absent value yields `"missing data"` instead.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Input had the wrong JSON shape
    #[error("{transform}: expected {expected}, found {found}")]
    WrongShape {
        /// Transform name
        transform: &'static str,
        /// Expected JSON shape
        expected: &'static str,
        /// What was actually there
        found: &'static str,
    },

    /// A required key was absent
    #[error("{transform}: key '{key}' missing from input")]
    MissingKey {
        /// Transform name
        transform: &'static str,
        /// The absent key
        key: String,
    },

    /// Options were contradictory or invalid
    #[error("{transform}: invalid options: {message}")]
    InvalidOptions {
        /// Transform name
        transform: &'static str,
        /// What was wrong
        message: String,
    },

    /// A pattern option failed to compile
    #[error("{transform}: invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Transform name
        transform: &'static str,
        /// The offending pattern
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl NormalizeError {
    /// Create a WrongShape error
    pub fn wrong_shape(
        transform: &'static str,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::WrongShape {
            transform,
            expected,
            found,
        }
    }

    /// Create a MissingKey error
    pub fn missing_key(transform: &'static str, key: impl Into<String>) -> Self {
        Self::MissingKey {
            transform,
            key: key.into(),
        }
    }

    /// Create an InvalidOptions error
    pub fn invalid_options(transform: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            transform,
            message: message.into(),
        }
    }
}

/// Name of a JSON value's shape, for error messages
pub(crate) fn shape_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
