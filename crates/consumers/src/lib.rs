//! tstream - Consumers
//!
//! The downstream edge of the pipeline: the `Consumer` contract every
//! adapter implements, the type registry that builds adapters from expanded
//! components, and the worker wrapper that gives each consumer its own task
//! and swallows its failures.
//!
//! Concrete cloud adapters (Kafka, Splunk, Azure, ...) live out of tree;
//! `stdout` (the `default` type) and `null` ship here as reference
//! implementations of the contract.

mod builtin;
mod context;
mod registry;
mod worker;

pub use builtin::{NullConsumer, StdoutConsumer};
pub use context::{Consumer, ConsumerContext, ConsumerError};
pub use registry::ConsumerRegistry;
pub use worker::ConsumerWorker;
