//! Consumer contract
//!
//! Every consumer, built-in or external, implements [`Consumer`] and is
//! invoked with a [`ConsumerContext`]: the record (already deep-copied, the
//! consumer may mutate it), the consumer's own type-specific config, an
//! optional tracer and opaque metadata.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tstream_protocol::Record;
use tstream_trace::Tracer;

/// Errors a consumer may report
///
/// These are logged by the worker and never propagated further
/// (ConsumerDispatchError semantics).
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The consumer could not be built from its config
    #[error("consumer init failed: {0}")]
    Init(String),

    /// A dispatch failed
    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

impl ConsumerError {
    /// Create an Init error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create a Dispatch error
    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }
}

/// Everything a consumer invocation receives
pub struct ConsumerContext<'a> {
    /// The record; the consumer owns this copy
    pub event: Record,
    /// Type-specific configuration from the declaration
    pub config: &'a Map<String, Value>,
    /// Output tracer, when the component has one
    pub tracer: Option<&'a Tracer>,
    /// Caller-opaque metadata
    pub metadata: &'a Value,
}

/// A push consumer
#[async_trait]
pub trait Consumer: Send + Sync + std::fmt::Debug {
    /// Consumer type name (e.g. `default`, `Generic_HTTP`)
    fn name(&self) -> &'static str;

    /// Gate applied before actions and dispatch
    ///
    /// The default accepts everything; pull-oriented types typically
    /// restrict to `systemInfo`.
    fn accepts(&self, _record: &Record) -> bool {
        true
    }

    /// Deliver one record
    async fn consume(&self, ctx: ConsumerContext<'_>) -> Result<(), ConsumerError>;
}
