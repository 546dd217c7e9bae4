//! Pipeline dispatcher
//!
//! Receives records from every producer, consults the mapping table and fans
//! each record out to its enabled target consumers. The mapping table and
//! consumer registry are the only cross-task mutable structures; both are
//! snapshot-read under a short critical section and swapped wholesale on
//! reconcile.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tstream_protocol::Record;

use crate::handle::ConsumerHandle;
use crate::mappings::MappingTable;
use crate::metrics::PipelineMetrics;

/// Record router shared by producers and the reconciler
pub struct Pipeline {
    mappings: RwLock<Arc<MappingTable>>,
    consumers: RwLock<Arc<HashMap<String, ConsumerHandle>>>,
    metrics: Arc<PipelineMetrics>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create a pipeline with no mappings or consumers
    pub fn new() -> Self {
        Self {
            mappings: RwLock::new(Arc::new(MappingTable::new())),
            consumers: RwLock::new(Arc::new(HashMap::new())),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Swap in a new mapping table (reconcile)
    pub fn set_mappings(&self, table: MappingTable) {
        *self.mappings.write() = Arc::new(table);
    }

    /// Swap in the consumer handle set (reconcile)
    pub fn set_consumers(&self, handles: Vec<ConsumerHandle>) {
        let map: HashMap<String, ConsumerHandle> = handles
            .into_iter()
            .map(|handle| (handle.id().to_string(), handle))
            .collect();
        *self.consumers.write() = Arc::new(map);
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of registered consumers
    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }

    /// Dispatch one record to its mapped consumers
    ///
    /// Each enabled target gets its own deep copy via `try_send`; a full or
    /// closed channel costs only that consumer its copy. Dispatch completes
    /// when every target has been offered the record.
    ///
    /// Returns the number of consumers that accepted the record.
    pub fn dispatch(&self, record: Record) -> usize {
        self.metrics.record_received();

        let mappings = Arc::clone(&self.mappings.read());
        let targets = mappings.route(&record.source_id);
        if targets.is_empty() {
            tracing::trace!(source_id = %record.source_id, "no consumers mapped, record dropped");
            self.metrics.record_unrouted();
            return 0;
        }

        let consumers = Arc::clone(&self.consumers.read());
        let mut accepted = 0;

        for consumer_id in targets {
            let Some(handle) = consumers.get(consumer_id) else {
                tracing::warn!(consumer = %consumer_id, "mapped consumer not registered");
                continue;
            };
            if !handle.is_enabled() || handle.is_closed() {
                continue;
            }

            // Deep copy per consumer; consumers may mutate freely
            match handle.try_send(record.clone()) {
                Ok(()) => {
                    self.metrics.consumer_send();
                    accepted += 1;
                }
                Err(_) => {
                    self.metrics.consumer_drop();
                    tracing::debug!(
                        consumer = %consumer_id,
                        source_id = %record.source_id,
                        "consumer channel full, record dropped for this consumer"
                    );
                }
            }
        }

        if accepted > 0 {
            self.metrics.record_dispatched();
        } else {
            self.metrics.record_unrouted();
        }
        accepted
    }

    /// Run the dispatcher over the producer channel until it closes or the
    /// token fires
    pub async fn run(
        self: Arc<Self>,
        mut records: mpsc::Receiver<Record>,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            consumers = self.consumer_count(),
            "pipeline dispatcher started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = records.recv() => {
                    match received {
                        Some(record) => {
                            self.dispatch(record);
                        }
                        None => break,
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            records_received = snapshot.records_received,
            records_dispatched = snapshot.records_dispatched,
            records_unrouted = snapshot.records_unrouted,
            consumer_drops = snapshot.consumer_drops,
            "pipeline dispatcher stopped"
        );
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("consumers", &self.consumer_count())
            .field("routes", &self.mappings.read().route_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
