//! Canonical pipeline record
//!
//! `Record` is the unit of data handed to the pipeline by listeners and
//! pollers. The `source_id` is the producing component's id; the pipeline
//! resolves it against the mapping table to find target consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SourceId;

/// The canonical datum flowing through the pipeline
///
/// Invariant: `event_category` is always set; the empty string is reserved
/// for unclassified data and is never produced by listeners or pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Category, serialized as `telemetryEventCategory`
    #[serde(rename = "telemetryEventCategory")]
    pub event_category: String,

    /// Structured payload
    pub data: Value,

    /// Pre-parse raw text, kept when input tracing or consumers want it
    #[serde(
        rename = "originalRawData",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub original_raw: Option<String>,

    /// Producing component id
    #[serde(rename = "sourceId")]
    pub source_id: SourceId,

    /// Tags merged from listener config and setTag actions
    ///
    /// BTreeMap keeps serialized output deterministic.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub tags: BTreeMap<String, String>,
}

impl Record {
    /// Create a record with the given category and payload
    pub fn new(category: impl Into<String>, data: Value, source_id: SourceId) -> Self {
        Self {
            event_category: category.into(),
            data,
            original_raw: None,
            source_id,
            tags: BTreeMap::new(),
        }
    }

    /// Attach the pre-parse raw text
    pub fn with_original_raw(mut self, raw: impl Into<String>) -> Self {
        self.original_raw = Some(raw.into());
        self
    }

    /// Merge a tag map into the record, later values win
    pub fn merge_tags<I, K, V>(&mut self, tags: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in tags {
            self.tags.insert(k.into(), v.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_field_names() {
        let record = Record::new(
            "LTM",
            json!({"virtual_name": "vs1"}),
            SourceId::new("ns::listener"),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["telemetryEventCategory"], "LTM");
        assert_eq!(value["sourceId"], "ns::listener");
        assert_eq!(value["data"]["virtual_name"], "vs1");
        // Empty optionals stay off the wire
        assert!(value.get("originalRawData").is_none());
        assert!(value.get("tags").is_none());
    }

    #[test]
    fn test_merge_tags_later_wins() {
        let mut record = Record::new("event", json!({}), SourceId::new("p"));
        record.merge_tags([("env", "prod"), ("site", "a")]);
        record.merge_tags([("site", "b")]);
        assert_eq!(record.tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(record.tags.get("site").map(String::as_str), Some("b"));
    }
}
