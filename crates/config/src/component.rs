//! Expanded components
//!
//! The resolver turns a declaration into a flat list of components, each with
//! a stable id, and a mapping table from producer ids to consumer ids. The
//! reconciler keys the live state by id plus a structural hash of the
//! component's relevant fields, so cosmetic edits (tracing) never restart
//! workers.

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tstream_vault::Secret;

use crate::actions::ActionConfig;

/// Producer id → consumer ids
///
/// Invariant: both sides of every edge exist in the component set and are
/// enabled. BTreeMap keeps re-resolution byte-identical.
pub type Mappings = BTreeMap<String, Vec<String>>;

/// Build the id `"<namespace>::<name>"`
pub fn component_id(namespace: &str, name: &str) -> String {
    format!("{namespace}::{name}")
}

/// Build the id `"<namespace>::<system>::<poller>"`
pub fn poller_component_id(namespace: &str, system: &str, poller: &str) -> String {
    format!("{namespace}::{system}::{poller}")
}

/// Management API scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    /// Default management port for the scheme
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 8100,
            Self::Https => 443,
        }
    }

    /// Scheme string for URL building
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// How to reach a device's management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    #[serde(rename = "allowSelfSignedCert")]
    pub allow_self_signed_cert: bool,
}

/// Credentials for a device's management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    /// Kept as declared (cipher-text); decrypted on use
    pub passphrase: Option<Secret>,
}

/// One resolved endpoint to poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub path: String,
    pub enable: bool,
}

/// Data handling options attached to a poller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataOpts {
    pub actions: Vec<ActionConfig>,
    pub tags: Map<String, Value>,
    #[serde(rename = "noTMStats")]
    pub no_tm_stats: bool,
}

/// Expanded system poller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPollerSpec {
    /// Seconds between cycles; `0` marks a pull-mode poller
    pub interval: u64,
    pub connection: Connection,
    pub credentials: Credentials,
    #[serde(rename = "endpointList", skip_serializing_if = "Option::is_none", default)]
    pub endpoint_list: Option<Vec<Endpoint>>,
    #[serde(rename = "dataOpts")]
    pub data_opts: DataOpts,
    /// Name of the enclosing (or synthesized) system
    #[serde(rename = "systemName")]
    pub system_name: String,
}

/// Expanded event listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub port: u16,
    /// Regex filter; frames that do not match are dropped
    #[serde(rename = "match", skip_serializing_if = "Option::is_none", default)]
    pub match_pattern: Option<String>,
    pub tags: Map<String, Value>,
    pub actions: Vec<ActionConfig>,
}

/// Expanded push consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerSpec {
    #[serde(rename = "type")]
    pub consumer_type: String,
    /// Type-specific configuration, secrets still cipher-text
    pub config: Map<String, Value>,
    pub actions: Vec<ActionConfig>,
}

/// Expanded pull consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullConsumerSpec {
    #[serde(rename = "type")]
    pub consumer_type: String,
    /// Poller names as declared, before group resolution
    #[serde(rename = "systemPoller")]
    pub system_pollers: Vec<String>,
}

/// Synthesized pull-consumer poller group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullGroupSpec {
    /// Id of the owning pull consumer
    #[serde(rename = "pullConsumer")]
    pub pull_consumer: String,
    /// Ordered, de-duplicated fully-qualified poller ids
    #[serde(rename = "systemPollers")]
    pub system_pollers: Vec<String>,
}

/// Class-specific component payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ComponentKind {
    SystemPoller(SystemPollerSpec),
    Listener(ListenerSpec),
    Consumer(ConsumerSpec),
    PullConsumer(PullConsumerSpec),
    PullConsumerGroup(PullGroupSpec),
    /// Recognized but handled by no worker in this build
    IHealthPoller,
}

/// Resolved trace configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSpec {
    /// Input trace path, when enabled
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input: Option<String>,
    /// Output trace path, when enabled
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<String>,
}

impl TraceSpec {
    /// Disabled tracing
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether any trace is enabled
    pub fn is_enabled(&self) -> bool {
        self.input.is_some() || self.output.is_some()
    }
}

/// The internal, id-addressed form of a declaration object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Stable id: `"<ns>::<name>"` or `"<ns>::<system>::<poller>"`
    pub id: String,
    pub namespace: String,
    pub name: String,
    /// Declaration class name
    pub class: String,
    pub enable: bool,
    pub trace: TraceSpec,
    /// Set on components outside a namespace-scoped update
    #[serde(rename = "skipUpdate", default)]
    pub skip_update: bool,
    #[serde(flatten)]
    pub kind: ComponentKind,
}

impl Component {
    /// Hash of the fields that require a worker restart when changed
    ///
    /// Trace configuration and the skip marker are cosmetic: they are
    /// excluded so a trace toggle updates the worker's config in place.
    pub fn structural_hash(&self) -> u64 {
        let relevant = serde_json::json!({
            "class": self.class,
            "enable": self.enable,
            "kind": self.kind,
        });
        let canonical = serde_json::to_string(&relevant).unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        hasher.finish()
    }
}
