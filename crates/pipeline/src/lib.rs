//! tstream - Pipeline
//!
//! The router between producers and consumers.
//!
//! # Architecture
//!
//! ```text
//! [Listeners]                 [Pipeline]                  [Consumers]
//!    L1 ────┐                                          ┌──→ splunk (task)
//!    L2 ────┼──→ mpsc::Receiver ──→ MappingTable ──────┼──→ statsd (task)
//! [Pollers] │                        lookup by          └──→ default (task)
//!    P1 ────┘                        source_id
//! ```
//!
//! # Key design
//!
//! - **Snapshot mappings**: the mapping table is swapped atomically on
//!   reconcile; the hot path reads a snapshot under a short lock.
//! - **Deep copy per consumer**: consumers may mutate their record freely.
//! - **Per-consumer isolation**: each consumer has its own bounded channel
//!   and task; a slow or failing consumer only ever loses its own records.
//! - **Backpressure**: `try_send` with drop-and-warn, never blocking the
//!   producer on one consumer.

mod dispatcher;
mod handle;
mod mappings;
mod metrics;

pub use dispatcher::Pipeline;
pub use handle::ConsumerHandle;
pub use mappings::MappingTable;
pub use metrics::{PipelineMetrics, PipelineSnapshot};

/// Default capacity of a consumer's record channel
pub const CONSUMER_CHANNEL_SIZE: usize = 1000;

/// Default capacity of the pipeline's input channel
pub const INPUT_CHANNEL_SIZE: usize = 10_000;
