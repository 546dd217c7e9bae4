//! Source identification types
//!
//! `SourceId` identifies the component that produced a record. For listeners
//! and pollers this is the expanded component id (`"<ns>::<name>"` or
//! `"<ns>::<system>::<poller>"`), which the pipeline uses to look up the
//! consumers that should receive the record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Producer identifier used for mapping lookups
///
/// # Example
///
/// ```
/// use tstream_protocol::SourceId;
///
/// let source = SourceId::new("f5telemetry_default::My_Listener");
/// assert_eq!(source.as_str(), "f5telemetry_default::My_Listener");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Create a new source ID
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the source ID as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
