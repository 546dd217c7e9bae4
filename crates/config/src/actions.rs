//! Action declarations
//!
//! Actions are user-ordered transformation steps attached to listeners,
//! poller data-opts and consumers. This module holds the declaration-side
//! model and its validation; execution lives in the actions crate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, Result};

/// One action in a declaration
///
/// Exactly one of the four action markers must be present. `locations` scopes
/// includeData/excludeData; `expression` configures JMESPath.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    /// Whether the action runs (default true)
    #[serde(default = "default_enable")]
    pub enable: bool,

    /// Merge a literal tag map into the record
    #[serde(rename = "setTag", skip_serializing_if = "Option::is_none", default)]
    pub set_tag: Option<Map<String, Value>>,

    /// Restrict `record.data` to the sub-trees named by `locations`
    #[serde(
        rename = "includeData",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub include_data: Option<Map<String, Value>>,

    /// Remove the sub-trees named by `locations` from `record.data`
    #[serde(
        rename = "excludeData",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub exclude_data: Option<Map<String, Value>>,

    /// Apply a JMESPath expression to `record.data`
    #[serde(rename = "JMESPath", skip_serializing_if = "Option::is_none", default)]
    pub jmes_path: Option<Map<String, Value>>,

    /// Path tree for includeData/excludeData
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub locations: Option<Value>,

    /// JMESPath expression text
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expression: Option<String>,
}

fn default_enable() -> bool {
    true
}

/// Which action a config resolves to, after validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    SetTag,
    IncludeData,
    ExcludeData,
    JmesPath,
}

impl ActionConfig {
    /// The action kind, if exactly one marker is present
    pub fn kind(&self) -> Option<ActionKind> {
        let mut kind = None;
        let mut count = 0;
        if self.set_tag.is_some() {
            kind = Some(ActionKind::SetTag);
            count += 1;
        }
        if self.include_data.is_some() {
            kind = Some(ActionKind::IncludeData);
            count += 1;
        }
        if self.exclude_data.is_some() {
            kind = Some(ActionKind::ExcludeData);
            count += 1;
        }
        if self.jmes_path.is_some() {
            kind = Some(ActionKind::JmesPath);
            count += 1;
        }
        if count == 1 { kind } else { None }
    }

    /// Validate the action shape
    ///
    /// `location` is the dotted path used in error messages.
    pub fn validate(&self, location: &str) -> Result<()> {
        let Some(kind) = self.kind() else {
            return Err(ConfigError::validation(
                location,
                "exactly one of setTag, includeData, excludeData, JMESPath must be set",
            ));
        };

        match kind {
            ActionKind::IncludeData | ActionKind::ExcludeData => {
                if self.locations.is_none() {
                    return Err(ConfigError::validation(
                        location,
                        "includeData/excludeData require 'locations'",
                    ));
                }
            }
            ActionKind::JmesPath => {
                if self.expression.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::validation(
                        location,
                        "JMESPath requires a non-empty 'expression'",
                    ));
                }
            }
            ActionKind::SetTag => {}
        }
        Ok(())
    }

    /// The default poller action set: tag records with tenant/application
    pub fn default_data_actions() -> Vec<ActionConfig> {
        let mut tags = Map::new();
        tags.insert("tenant".into(), Value::String("`T`".into()));
        tags.insert("application".into(), Value::String("`A`".into()));
        vec![ActionConfig {
            enable: true,
            set_tag: Some(tags),
            include_data: None,
            exclude_data: None,
            jmes_path: None,
            locations: None,
            expression: None,
        }]
    }
}
