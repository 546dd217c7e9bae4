//! Reconciler
//!
//! Diffs a freshly resolved component set against the running workers and
//! starts, stops or replaces only what changed.
//!
//! # Diff rules
//!
//! - Keyed by component id plus the structural hash of the component's
//!   relevant fields. Unchanged components keep their workers and in-flight
//!   data.
//! - Trace-only changes rebuild the worker but never its sockets (the hash
//!   excludes trace).
//! - A listener's match/actions change replaces the listener task; only a
//!   port change touches sockets, and only via the manager's refcount.
//! - Components with `skip_update` (outside a namespace-scoped apply) are
//!   left exactly as they run today.
//! - Removed components are fully torn down.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;
use tstream_config::{
    Component, ComponentKind, PullGroupSpec, Resolved, TraceSpec, classes,
};
use tstream_consumers::{ConsumerRegistry, ConsumerWorker};
use tstream_http::ClientPool;
use tstream_pipeline::{ConsumerHandle, MappingTable, Pipeline};
use tstream_pollers::{Poller, PollerHandle};
use tstream_protocol::Record;
use tstream_sources::{EventListener, ListenerHandle, ReceiverManager};
use tstream_vault::SecretVault;

use crate::error::{ControllerError, Result};

struct RunningListener {
    hash: u64,
    trace: TraceSpec,
    port: u16,
    handle: ListenerHandle,
}

struct RunningPoller {
    hash: u64,
    trace: TraceSpec,
    handle: PollerHandle,
}

struct RunningConsumer {
    hash: u64,
    trace: TraceSpec,
    worker: ConsumerWorker,
}

/// Applies resolved component sets to the running workers
pub struct Reconciler {
    manager: Arc<ReceiverManager>,
    pipeline: Arc<Pipeline>,
    registry: ConsumerRegistry,
    pool: Arc<ClientPool>,
    vault: SecretVault,
    records_tx: mpsc::Sender<Record>,

    listeners: HashMap<String, RunningListener>,
    pollers: HashMap<String, RunningPoller>,
    consumers: HashMap<String, RunningConsumer>,
    groups: HashMap<String, PullGroupSpec>,
    components: Vec<Component>,
}

impl Reconciler {
    /// Create a reconciler over the shared services
    pub fn new(
        manager: Arc<ReceiverManager>,
        pipeline: Arc<Pipeline>,
        registry: ConsumerRegistry,
        pool: Arc<ClientPool>,
        vault: SecretVault,
        records_tx: mpsc::Sender<Record>,
    ) -> Self {
        Self {
            manager,
            pipeline,
            registry,
            pool,
            vault,
            records_tx,
            listeners: HashMap::new(),
            pollers: HashMap::new(),
            consumers: HashMap::new(),
            groups: HashMap::new(),
            components: Vec::new(),
        }
    }

    /// The currently applied component set
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Apply a resolved declaration
    ///
    /// Worker churn is computed per class; the mapping table and consumer
    /// handles are swapped atomically at the end so the data plane never
    /// sees a half-applied configuration.
    pub async fn apply(&mut self, resolved: &Resolved) {
        self.apply_consumers(&resolved.components).await;
        self.apply_pollers(&resolved.components).await;
        self.apply_listeners(&resolved.components).await;

        self.groups = resolved
            .components
            .iter()
            .filter_map(|component| match &component.kind {
                ComponentKind::PullConsumerGroup(spec) if component.enable => {
                    Some((component.id.clone(), spec.clone()))
                }
                _ => None,
            })
            .collect();

        let handles: Vec<ConsumerHandle> = self
            .consumers
            .values()
            .map(|running| running.worker.handle())
            .collect();
        self.pipeline.set_consumers(handles);
        self.pipeline
            .set_mappings(MappingTable::from_mappings(&resolved.mappings));

        self.components = resolved.components.clone();

        tracing::info!(
            listeners = self.listeners.len(),
            pollers = self.pollers.len(),
            consumers = self.consumers.len(),
            pull_groups = self.groups.len(),
            "reconcile complete"
        );
    }

    /// Tear everything down
    pub async fn shutdown(&mut self) {
        for (_, running) in self.listeners.drain() {
            running.handle.stop().await;
            self.manager.unsubscribe(running.port).await;
        }
        for (_, running) in self.pollers.drain() {
            running.handle.stop().await;
        }
        for (_, running) in self.consumers.drain() {
            running.worker.stop().await;
        }
        self.manager.shutdown().await;
        self.groups.clear();
        self.components.clear();
    }

    async fn apply_listeners(&mut self, components: &[Component]) {
        let wanted: HashMap<&str, &Component> = components
            .iter()
            .filter(|c| c.class == classes::LISTENER && c.enable)
            .map(|c| (c.id.as_str(), c))
            .collect();

        // Stop removed listeners outright
        let removed: Vec<String> = self
            .listeners
            .keys()
            .filter(|id| !wanted.contains_key(id.as_str()))
            .cloned()
            .collect();
        for id in removed {
            let running = self.listeners.remove(&id).expect("collected above");
            tracing::info!(listener = %id, "stopping listener");
            running.handle.stop().await;
            self.manager.unsubscribe(running.port).await;
        }

        for (id, component) in wanted {
            let ComponentKind::Listener(spec) = &component.kind else {
                continue;
            };
            let hash = component.structural_hash();

            let unchanged = self.listeners.get(id).is_some_and(|running| {
                component.skip_update
                    || (running.hash == hash && running.trace == component.trace)
            });
            if unchanged {
                continue;
            }

            // Take the new subscription before releasing the old one: a
            // changed match/actions/trace on a surviving port never closes
            // its sockets. Only a port change retires sockets, and only
            // after the new port is up.
            let previous = self.listeners.remove(id);
            let frames = self.manager.subscribe(spec.port);
            let old_port = match previous {
                Some(running) => {
                    tracing::info!(listener = %id, "restarting listener");
                    let port = running.port;
                    running.handle.stop().await;
                    Some(port)
                }
                None => None,
            };

            match EventListener::from_component(component, self.records_tx.clone()) {
                Ok(listener) => {
                    let handle = listener.spawn(frames);
                    self.listeners.insert(
                        id.to_string(),
                        RunningListener {
                            hash,
                            trace: component.trace.clone(),
                            port: spec.port,
                            handle,
                        },
                    );
                }
                Err(e) => {
                    tracing::error!(listener = %id, error = %e, "failed to start listener");
                    self.manager.unsubscribe(spec.port).await;
                }
            }

            if let Some(port) = old_port {
                self.manager.unsubscribe(port).await;
            }
        }
    }

    async fn apply_pollers(&mut self, components: &[Component]) {
        let wanted: HashMap<&str, &Component> = components
            .iter()
            .filter(|c| c.class == classes::SYSTEM_POLLER && c.enable)
            .map(|c| (c.id.as_str(), c))
            .collect();

        let mut to_stop = Vec::new();
        for (id, running) in &self.pollers {
            match wanted.get(id.as_str()) {
                Some(component) if component.skip_update => {}
                Some(component)
                    if component.structural_hash() == running.hash
                        && component.trace == running.trace => {}
                _ => to_stop.push(id.clone()),
            }
        }
        for id in to_stop {
            let running = self.pollers.remove(&id).expect("collected above");
            tracing::info!(poller = %id, "stopping poller");
            running.handle.stop().await;
        }

        for (id, component) in wanted {
            if self.pollers.contains_key(id) {
                continue;
            }
            match Poller::from_component(
                component,
                Arc::clone(&self.pool),
                self.vault.clone(),
                self.records_tx.clone(),
            ) {
                Ok(poller) => {
                    let handle = poller.spawn();
                    self.pollers.insert(
                        id.to_string(),
                        RunningPoller {
                            hash: component.structural_hash(),
                            trace: component.trace.clone(),
                            handle,
                        },
                    );
                }
                Err(e) => {
                    tracing::error!(poller = %id, error = %e, "failed to start poller");
                }
            }
        }
    }

    async fn apply_consumers(&mut self, components: &[Component]) {
        let wanted: HashMap<&str, &Component> = components
            .iter()
            .filter(|c| c.class == classes::CONSUMER && c.enable)
            .map(|c| (c.id.as_str(), c))
            .collect();

        let mut to_stop = Vec::new();
        for (id, running) in &self.consumers {
            match wanted.get(id.as_str()) {
                Some(component) if component.skip_update => {}
                Some(component)
                    if component.structural_hash() == running.hash
                        && component.trace == running.trace => {}
                _ => to_stop.push(id.clone()),
            }
        }
        for id in to_stop {
            let running = self.consumers.remove(&id).expect("collected above");
            tracing::info!(consumer = %id, "stopping consumer");
            running.worker.stop().await;
        }

        for (id, component) in wanted {
            if self.consumers.contains_key(id) {
                continue;
            }
            match ConsumerWorker::spawn(component, &self.registry, Value::Null) {
                Ok(worker) => {
                    self.consumers.insert(
                        id.to_string(),
                        RunningConsumer {
                            hash: component.structural_hash(),
                            trace: component.trace.clone(),
                            worker,
                        },
                    );
                }
                Err(e) => {
                    tracing::error!(consumer = %id, error = %e, "failed to start consumer");
                }
            }
        }
    }

    /// Drive a pull consumer's pollers synchronously, returning the records
    ///
    /// Called by the pull-mode scrape surface. Each referenced poller runs
    /// one cycle; a failing poller is logged and skipped.
    pub async fn scrape(&self, pull_consumer_id: &str) -> Result<Vec<Record>> {
        let group = self
            .groups
            .values()
            .find(|spec| spec.pull_consumer == pull_consumer_id)
            .ok_or_else(|| ControllerError::object_not_found(pull_consumer_id))?;

        let mut records = Vec::with_capacity(group.system_pollers.len());
        for poller_id in &group.system_pollers {
            let Some(running) = self.pollers.get(poller_id) else {
                return Err(ControllerError::PollerUnavailable {
                    id: poller_id.clone(),
                });
            };
            match running.handle.poller().fetch_once().await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(poller = %poller_id, error = %e, "on-demand poll failed");
                }
            }
        }
        Ok(records)
    }

    /// Inject a frame on a listener's port, as if received over the wire
    pub fn inject_event(&self, listener_id: &str, data: Bytes) -> Result<()> {
        let running = self
            .listeners
            .get(listener_id)
            .ok_or_else(|| ControllerError::object_not_found(listener_id))?;
        self.manager.inject(running.port, data)?;
        Ok(())
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("listeners", &self.listeners.len())
            .field("pollers", &self.pollers.len())
            .field("consumers", &self.consumers.len())
            .finish()
    }
}
