//! Declaration model
//!
//! A declaration is a JSON document whose root carries `class: "Telemetry"`.
//! Every other root entry is either a global control (`schemaVersion`,
//! `Controls`) or a named object tagged with a `class`. A `Telemetry_Namespace`
//! object nests a scoped set of the same object kinds.
//!
//! This module holds the typed per-class models. Serde does the field-level
//! validation (`deny_unknown_fields`, defaults); structural rules that span
//! objects live in the resolver.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tstream_vault::Secret;

use crate::actions::ActionConfig;
use crate::component::Protocol;
use crate::error::{ConfigError, Result};

/// Root class tag
pub const CLASS_TELEMETRY: &str = "Telemetry";

/// The implicit namespace for objects declared at the root
pub const DEFAULT_NAMESPACE: &str = "f5telemetry_default";

/// Class name constants
pub mod classes {
    pub const CONTROLS: &str = "Controls";
    pub const SYSTEM: &str = "Telemetry_System";
    pub const SYSTEM_POLLER: &str = "Telemetry_System_Poller";
    pub const LISTENER: &str = "Telemetry_Listener";
    pub const CONSUMER: &str = "Telemetry_Consumer";
    pub const PULL_CONSUMER: &str = "Telemetry_Pull_Consumer";
    pub const ENDPOINTS: &str = "Telemetry_Endpoints";
    pub const IHEALTH_POLLER: &str = "Telemetry_iHealth_Poller";
    pub const NAMESPACE: &str = "Telemetry_Namespace";
    /// Synthesized by the resolver, never declared by users
    pub const PULL_CONSUMER_GROUP: &str = "Telemetry_Pull_Consumer_System_Poller_Group";
}

/// Root keys that are controls rather than named objects
const CONTROL_KEYS: &[&str] = &["class", "schemaVersion", "$schema"];

/// One value or a list of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flatten into a vector
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

/// Raw `trace` field forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceValue {
    /// `true` enables an output trace at the default path
    Enabled(bool),
    /// A string sets a custom output path
    Path(String),
    /// An array allows input and output traces to coexist
    Multi(Vec<TraceEntry>),
}

/// One entry of an array-form `trace`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceEntry {
    /// `input` or `output`
    #[serde(rename = "type")]
    pub direction: TraceEntryType,
    /// Custom path; default path is used when absent
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
}

/// Direction of an array-form trace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceEntryType {
    Input,
    Output,
}

/// `Controls` object
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlsDecl {
    pub class: String,
    #[serde(rename = "logLevel", default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(rename = "memoryThresholdPercent", default = "default_memory_threshold")]
    pub memory_threshold_percent: u8,
}

fn default_memory_threshold() -> u8 {
    90
}

/// `Telemetry_System` object
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemDecl {
    pub class: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub trace: Option<TraceValue>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(rename = "allowSelfSignedCert", default)]
    pub allow_self_signed_cert: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub passphrase: Option<Secret>,
    /// Poller references or inline poller objects
    #[serde(rename = "systemPoller", default)]
    pub system_poller: Option<OneOrMany<PollerRef>>,
}

/// A `systemPoller` array element: a named reference or an inline poller
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PollerRef {
    Ref(String),
    Inline(SystemPollerDecl),
}

/// `Telemetry_System_Poller` object, standalone or inline
///
/// Inline pollers (inside a system's `systemPoller` array) omit `class`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemPollerDecl {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub trace: Option<TraceValue>,
    /// Seconds between cycles; `0` marks a pull-mode poller
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(rename = "allowSelfSignedCert", default)]
    pub allow_self_signed_cert: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub passphrase: Option<Secret>,
    #[serde(rename = "endpointList", default)]
    pub endpoint_list: Option<EndpointListValue>,
    #[serde(default)]
    pub actions: Option<Vec<ActionConfig>>,
    #[serde(default)]
    pub tag: Option<Map<String, Value>>,
    #[serde(rename = "noTMStats", default)]
    pub no_tm_stats: bool,
}

/// `endpointList` forms: a single reference or a list of references and
/// inline endpoint objects
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EndpointListValue {
    Ref(String),
    List(Vec<EndpointRef>),
}

/// One `endpointList` element
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EndpointRef {
    Ref(String),
    Inline(EndpointItemDecl),
}

/// Inline endpoint or `Telemetry_Endpoints` item
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointItemDecl {
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
    #[serde(default = "default_true")]
    pub enable: bool,
}

/// `Telemetry_Endpoints` object
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointsDecl {
    pub class: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(rename = "basePath", default)]
    pub base_path: Option<String>,
    pub items: Map<String, Value>,
}

/// `Telemetry_Listener` object
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerDecl {
    pub class: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub trace: Option<TraceValue>,
    #[serde(default = "default_listener_port")]
    pub port: u16,
    /// Regex filter; frames that do not match are dropped
    #[serde(rename = "match", default)]
    pub match_pattern: Option<String>,
    #[serde(default)]
    pub tag: Option<Map<String, Value>>,
    #[serde(default)]
    pub actions: Option<Vec<ActionConfig>>,
}

fn default_listener_port() -> u16 {
    6514
}

/// `Telemetry_Consumer` object
///
/// Type-specific fields (hosts, paths, secrets) are collected in `extra` and
/// handed to the consumer implementation untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerDecl {
    pub class: String,
    #[serde(rename = "type")]
    pub consumer_type: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub trace: Option<TraceValue>,
    #[serde(default)]
    pub actions: Option<Vec<ActionConfig>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `Telemetry_Pull_Consumer` object
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PullConsumerDecl {
    pub class: String,
    #[serde(rename = "type")]
    pub consumer_type: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub trace: Option<TraceValue>,
    #[serde(rename = "systemPoller")]
    pub system_poller: OneOrMany<String>,
}

/// `Telemetry_iHealth_Poller` object
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IHealthPollerDecl {
    pub class: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub trace: Option<TraceValue>,
    pub username: String,
    pub passphrase: Secret,
    /// Upload schedule, kept opaque
    #[serde(default)]
    pub interval: Option<Value>,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "localhost".into()
}

fn default_interval() -> u64 {
    300
}

/// A validated declaration root
///
/// Holds the raw JSON (for persistence) plus accessors the resolver walks.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    raw: Value,
}

impl Declaration {
    /// An empty declaration: the load() fallback
    pub fn empty() -> Self {
        let mut root = Map::new();
        root.insert("class".into(), Value::String(CLASS_TELEMETRY.into()));
        Self {
            raw: Value::Object(root),
        }
    }

    /// Wrap a JSON document, checking only the root shape
    ///
    /// # Errors
    ///
    /// Fails when the root is not an object or its class is not `Telemetry`.
    pub fn from_value(raw: Value) -> Result<Self> {
        let Some(root) = raw.as_object() else {
            return Err(ConfigError::validation("$", "declaration must be an object"));
        };
        match root.get("class").and_then(Value::as_str) {
            Some(CLASS_TELEMETRY) => Ok(Self { raw }),
            Some(other) => Err(ConfigError::validation(
                "class",
                format!("expected '{CLASS_TELEMETRY}', found '{other}'"),
            )),
            None => Err(ConfigError::validation("class", "missing root class")),
        }
    }

    /// The raw JSON document
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Consume into the raw JSON document
    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// Root object entries that are named objects (skips control keys)
    pub fn objects(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.raw
            .as_object()
            .into_iter()
            .flat_map(|root| root.iter())
            .filter(|(key, _)| !CONTROL_KEYS.contains(&key.as_str()))
    }

    /// Slice the declaration to one namespace's raw objects
    ///
    /// Returns `None` when no `Telemetry_Namespace` of that name exists.
    /// The default namespace slice contains the root-level objects.
    pub fn namespace_slice(&self, namespace: &str) -> Option<Map<String, Value>> {
        let root = self.raw.as_object()?;
        if namespace == DEFAULT_NAMESPACE {
            let mut out = Map::new();
            for (key, value) in self.objects() {
                if class_of(value) != Some(classes::NAMESPACE) {
                    out.insert(key.clone(), value.clone());
                }
            }
            return Some(out);
        }
        let ns = root.get(namespace)?;
        if class_of(ns) != Some(classes::NAMESPACE) {
            return None;
        }
        let mut out = Map::new();
        for (key, value) in ns.as_object()?.iter() {
            if key != "class" {
                out.insert(key.clone(), value.clone());
            }
        }
        Some(out)
    }

    /// Replace (or insert) one namespace's objects, returning the merged
    /// declaration
    pub fn with_namespace(&self, namespace: &str, objects: Map<String, Value>) -> Self {
        let mut root = self
            .raw
            .as_object()
            .cloned()
            .unwrap_or_default();
        if namespace == DEFAULT_NAMESPACE {
            // Drop current root-level objects, keep controls and namespaces
            root.retain(|key, value| {
                CONTROL_KEYS.contains(&key.as_str())
                    || class_of(value) == Some(classes::NAMESPACE)
                    || class_of(value) == Some(classes::CONTROLS)
            });
            for (key, value) in objects {
                root.insert(key, value);
            }
        } else {
            let mut ns = Map::new();
            ns.insert("class".into(), Value::String(classes::NAMESPACE.into()));
            for (key, value) in objects {
                ns.insert(key, value);
            }
            root.insert(namespace.to_string(), Value::Object(ns));
        }
        Self {
            raw: Value::Object(root),
        }
    }
}

/// The `class` tag of a JSON object, if any
pub fn class_of(value: &Value) -> Option<&str> {
    value.as_object()?.get("class")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_class_required() {
        assert!(Declaration::from_value(json!({"class": "Telemetry"})).is_ok());
        assert!(Declaration::from_value(json!({"class": "AS3"})).is_err());
        assert!(Declaration::from_value(json!({})).is_err());
        assert!(Declaration::from_value(json!([])).is_err());
    }

    #[test]
    fn test_objects_skips_controls() {
        let decl = Declaration::from_value(json!({
            "class": "Telemetry",
            "schemaVersion": "1.30.0",
            "My_Listener": {"class": "Telemetry_Listener"},
        }))
        .unwrap();
        let keys: Vec<_> = decl.objects().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["My_Listener"]);
    }

    #[test]
    fn test_namespace_slice() {
        let decl = Declaration::from_value(json!({
            "class": "Telemetry",
            "Root_Listener": {"class": "Telemetry_Listener"},
            "My_NS": {
                "class": "Telemetry_Namespace",
                "Inner_Listener": {"class": "Telemetry_Listener"},
            },
        }))
        .unwrap();

        let default = decl.namespace_slice(DEFAULT_NAMESPACE).unwrap();
        assert!(default.contains_key("Root_Listener"));
        assert!(!default.contains_key("My_NS"));

        let ns = decl.namespace_slice("My_NS").unwrap();
        assert!(ns.contains_key("Inner_Listener"));
        assert!(!ns.contains_key("class"));

        assert!(decl.namespace_slice("Missing").is_none());
    }

    #[test]
    fn test_with_namespace_round_trip() {
        let decl = Declaration::empty();
        let mut objects = Map::new();
        objects.insert(
            "L".into(),
            json!({"class": "Telemetry_Listener", "port": 7000}),
        );
        let merged = decl.with_namespace("My_NS", objects);

        let slice = merged.namespace_slice("My_NS").unwrap();
        assert_eq!(slice["L"]["port"], 7000);
        // Root object set untouched
        assert_eq!(merged.namespace_slice(DEFAULT_NAMESPACE).unwrap().len(), 0);
    }

    #[test]
    fn test_listener_defaults() {
        let listener: ListenerDecl =
            serde_json::from_value(json!({"class": "Telemetry_Listener"})).unwrap();
        assert_eq!(listener.port, 6514);
        assert!(listener.enable);
        assert!(listener.match_pattern.is_none());
    }

    #[test]
    fn test_listener_unknown_field_rejected() {
        let result: std::result::Result<ListenerDecl, _> =
            serde_json::from_value(json!({"class": "Telemetry_Listener", "prot": "tcp"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_poller_defaults() {
        let poller: SystemPollerDecl = serde_json::from_value(json!({})).unwrap();
        assert_eq!(poller.interval, 300);
        assert_eq!(poller.host, "localhost");
        assert!(poller.port.is_none());
        assert!(!poller.no_tm_stats);
    }

    #[test]
    fn test_trace_value_forms() {
        let enabled: TraceValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(enabled, TraceValue::Enabled(true));

        let path: TraceValue = serde_json::from_value(json!("/tmp/t")).unwrap();
        assert_eq!(path, TraceValue::Path("/tmp/t".into()));

        let multi: TraceValue =
            serde_json::from_value(json!([{"type": "input"}, {"type": "output", "path": "/x"}]))
                .unwrap();
        match multi {
            TraceValue::Multi(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].direction, TraceEntryType::Input);
                assert_eq!(entries[1].path.as_deref(), Some("/x"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_consumer_extra_fields_collected() {
        let consumer: ConsumerDecl = serde_json::from_value(json!({
            "class": "Telemetry_Consumer",
            "type": "Generic_HTTP",
            "host": "collector.example.com",
            "passphrase": {"cipherText": "YWJj"},
        }))
        .unwrap();
        assert_eq!(consumer.consumer_type, "Generic_HTTP");
        assert_eq!(consumer.extra["host"], "collector.example.com");
    }

    #[test]
    fn test_pull_consumer_one_or_many() {
        let single: PullConsumerDecl = serde_json::from_value(json!({
            "class": "Telemetry_Pull_Consumer",
            "type": "default",
            "systemPoller": "Poller_1",
        }))
        .unwrap();
        assert_eq!(single.system_poller.clone().into_vec(), vec!["Poller_1"]);

        let many: PullConsumerDecl = serde_json::from_value(json!({
            "class": "Telemetry_Pull_Consumer",
            "type": "default",
            "systemPoller": ["A", "B"],
        }))
        .unwrap();
        assert_eq!(many.system_poller.into_vec(), vec!["A", "B"]);
    }
}
