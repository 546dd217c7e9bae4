//! tstream - Configuration
//!
//! Two layers of configuration live here:
//!
//! 1. The **bootstrap config**: a small TOML file read once at process start
//!    (log level, storage path, debug controls). Parse it with the `FromStr`
//!    impl on [`BootstrapConfig`].
//! 2. The **declaration**: the user-supplied JSON document describing
//!    systems, pollers, listeners and consumers. [`resolve`] validates a
//!    declaration and expands it into a flat, id-addressed set of
//!    [`Component`]s plus the producer-to-consumer [`Mappings`].
//!
//! # Example declaration
//!
//! ```json
//! {
//!     "class": "Telemetry",
//!     "My_Listener": { "class": "Telemetry_Listener", "port": 6514 },
//!     "My_Consumer": { "class": "Telemetry_Consumer", "type": "default" }
//! }
//! ```
//!
//! Expansion assigns every object an id of the form `"<namespace>::<name>"`
//! (or `"<namespace>::<system>::<poller>"` for system-scoped pollers), with
//! the implicit default namespace `f5telemetry_default`.

mod actions;
mod bootstrap;
mod component;
mod declaration;
mod error;
mod resolver;

pub use actions::{ActionConfig, ActionKind};
pub use bootstrap::{BootstrapConfig, ControlsConfig, LogConfig, LogFormat, LogLevel, StorageConfig};
pub use component::{
    Component, ComponentKind, Connection, ConsumerSpec, Credentials, DataOpts, Endpoint,
    ListenerSpec, Mappings, Protocol, PullConsumerSpec, PullGroupSpec, SystemPollerSpec,
    TraceSpec, component_id, poller_component_id,
};
pub use declaration::{
    CLASS_TELEMETRY, DEFAULT_NAMESPACE, Declaration, classes,
};
pub use error::{ConfigError, Result};
pub use resolver::{Resolved, resolve, resolve_with_current};
