//! Config worker
//!
//! The single entry point for declaration changes. Every apply is serialized
//! through one async mutex (concurrent callers queue), validated, expanded,
//! optionally persisted, applied to the workers through the reconciler, and
//! announced on the event channel.
//!
//! # Events
//!
//! `received`, `validationSucceed`, `validationFailed` and `change`, each
//! carrying the invocation's `transaction_id` and the caller's opaque
//! metadata.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast};
use tstream_config::{Declaration, Resolved, classes, resolve_with_current};
use tstream_protocol::Record;
use tstream_vault::{Secret, SecretVault};
use uuid::Uuid;

use crate::error::{ControllerError, Result};
use crate::reconciler::Reconciler;
use crate::storage::{CONFIG_KEY, Storage};

/// Options for a declaration apply
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Return the expanded component view instead of the raw declaration
    pub expanded: bool,
    /// Persist the accepted declaration
    pub save: bool,
    /// Opaque metadata echoed in every event of this invocation
    pub metadata: Option<Value>,
    /// Restrict worker rebuilds to one namespace
    pub namespace_to_update: Option<String>,
}

impl ProcessOptions {
    /// The common case: validate, persist, rebuild everything
    pub fn save() -> Self {
        Self {
            save: true,
            ..Self::default()
        }
    }
}

/// Lifecycle events emitted by the worker
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    Received {
        transaction_id: Uuid,
        metadata: Option<Value>,
    },
    ValidationSucceed {
        transaction_id: Uuid,
        metadata: Option<Value>,
    },
    ValidationFailed {
        transaction_id: Uuid,
        metadata: Option<Value>,
        error: String,
    },
    Change {
        transaction_id: Uuid,
        metadata: Option<Value>,
        components: usize,
    },
}

/// Result of a successful apply
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub transaction_id: Uuid,
    /// Raw declaration, or the expanded view when requested
    pub declaration: Value,
    pub components: usize,
}

struct WorkerState {
    declaration: Declaration,
    reconciler: Reconciler,
}

/// Serialized declaration processor
pub struct ConfigWorker {
    storage: Arc<dyn Storage>,
    vault: SecretVault,
    state: Mutex<WorkerState>,
    events: broadcast::Sender<ConfigEvent>,
    /// Gates the event-injection debug facility
    debug: std::sync::atomic::AtomicBool,
}

impl ConfigWorker {
    /// Create a worker over storage and a reconciler
    pub fn new(storage: Arc<dyn Storage>, vault: SecretVault, reconciler: Reconciler) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            storage,
            vault,
            state: Mutex::new(WorkerState {
                declaration: Declaration::empty(),
                reconciler,
            }),
            events,
            debug: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Enable or disable the debug facilities (bootstrap `controls.debug`)
    pub fn set_debug(&self, enabled: bool) {
        self.debug
            .store(enabled, std::sync::atomic::Ordering::Relaxed);
    }

    /// Subscribe to lifecycle events
    pub fn events(&self) -> broadcast::Receiver<ConfigEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ConfigEvent) {
        let _ = self.events.send(event);
    }

    /// The stored raw declaration, optionally sliced to one namespace
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` when the namespace does not exist.
    pub async fn get_declaration(&self, namespace: Option<&str>) -> Result<Value> {
        let state = self.state.lock().await;
        match namespace {
            None => Ok(state.declaration.raw().clone()),
            Some(ns) => {
                let slice = state
                    .declaration
                    .namespace_slice(ns)
                    .ok_or_else(|| ControllerError::object_not_found(ns))?;
                Ok(Value::Object(slice))
            }
        }
    }

    /// Validate, expand, optionally persist and apply a declaration
    ///
    /// Strictly serialized: concurrent calls queue on the worker's state
    /// lock and are processed one at a time, end-to-end.
    pub async fn process_declaration(
        &self,
        raw: Value,
        opts: ProcessOptions,
    ) -> Result<ProcessOutcome> {
        // Serialize end-to-end: concurrent applies queue on this lock and
        // even their events cannot interleave
        let mut state = self.state.lock().await;

        let transaction_id = Uuid::new_v4();
        self.emit(ConfigEvent::Received {
            transaction_id,
            metadata: opts.metadata.clone(),
        });

        let resolved = match self.validate(&raw, &state, opts.namespace_to_update.as_deref()) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.emit(ConfigEvent::ValidationFailed {
                    transaction_id,
                    metadata: opts.metadata.clone(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };
        self.emit(ConfigEvent::ValidationSucceed {
            transaction_id,
            metadata: opts.metadata.clone(),
        });

        // Secrets go to rest protected; plaintext only ever lives in workers
        let protected_raw = self.protect_secrets(raw);
        let declaration = Declaration::from_value(protected_raw)?;

        if opts.save {
            let blob = serde_json::json!({"raw": declaration.raw()});
            self.storage.save(CONFIG_KEY, &blob).await?;
        }

        state.reconciler.apply(&resolved).await;
        state.declaration = declaration;

        tracing::info!(
            %transaction_id,
            components = resolved.components.len(),
            mappings = resolved.mappings.len(),
            "declaration applied"
        );
        self.emit(ConfigEvent::Change {
            transaction_id,
            metadata: opts.metadata.clone(),
            components: resolved.components.len(),
        });

        let declaration_view = if opts.expanded {
            serde_json::to_value(&resolved.components).unwrap_or(Value::Null)
        } else {
            state.declaration.raw().clone()
        };

        Ok(ProcessOutcome {
            transaction_id,
            declaration: declaration_view,
            components: resolved.components.len(),
        })
    }

    /// Validate a namespace fragment, merge it into the stored declaration
    /// and process the result scoped to that namespace
    pub async fn process_namespace_declaration(
        &self,
        fragment: Value,
        namespace: &str,
        mut opts: ProcessOptions,
    ) -> Result<ProcessOutcome> {
        let Some(mut objects) = fragment.as_object().cloned() else {
            return Err(ControllerError::Validation(
                tstream_config::ConfigError::validation(
                    namespace,
                    "namespace declaration must be an object",
                ),
            ));
        };
        // A fragment may carry its own class tag; anything else is an error
        if let Some(class) = objects.get("class") {
            if class != classes::NAMESPACE {
                return Err(ControllerError::Validation(
                    tstream_config::ConfigError::validation(
                        namespace,
                        format!("expected class '{}'", classes::NAMESPACE),
                    ),
                ));
            }
            objects.shift_remove("class");
        }

        let merged = {
            let state = self.state.lock().await;
            state.declaration.with_namespace(namespace, objects)
        };
        opts.namespace_to_update = Some(namespace.to_string());
        self.process_declaration(merged.into_raw(), opts).await
    }

    /// Rehydrate from storage at startup
    ///
    /// On any failure the worker starts from an empty declaration and logs;
    /// the stored blob is never overwritten by the fallback.
    pub async fn load(&self) -> Result<ProcessOutcome> {
        let raw = match self.storage.load(CONFIG_KEY).await {
            Ok(Some(blob)) => match blob.get("raw") {
                Some(raw) => raw.clone(),
                None => {
                    tracing::warn!("stored declaration has no 'raw' key, starting empty");
                    Declaration::empty().into_raw()
                }
            },
            Ok(None) => Declaration::empty().into_raw(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load stored declaration, starting empty");
                Declaration::empty().into_raw()
            }
        };

        match self
            .process_declaration(raw, ProcessOptions::default())
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "stored declaration invalid, starting empty");
                self.process_declaration(
                    Declaration::empty().into_raw(),
                    ProcessOptions::default(),
                )
                .await
            }
        }
    }

    /// Drop in-memory state and remove the persisted blob
    pub async fn cleanup(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.reconciler.shutdown().await;
        state.declaration = Declaration::empty();
        self.storage.remove(CONFIG_KEY).await
    }

    /// Stop all workers, keeping the persisted declaration
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.reconciler.shutdown().await;
    }

    /// The current expanded component set
    pub async fn components(&self) -> Vec<tstream_config::Component> {
        self.state.lock().await.reconciler.components().to_vec()
    }

    /// Drive a pull consumer's pollers and return the collected records
    pub async fn scrape(&self, namespace: &str, consumer_name: &str) -> Result<Vec<Record>> {
        let state = self.state.lock().await;
        let id = tstream_config::component_id(namespace, consumer_name);
        state.reconciler.scrape(&id).await
    }

    /// Inject an event frame on a listener, as if received on its port
    ///
    /// Only available while debug is enabled.
    pub async fn inject_event(
        &self,
        namespace: &str,
        listener_name: &str,
        body: Bytes,
    ) -> Result<()> {
        if !self.debug.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(ControllerError::DebugDisabled);
        }
        let state = self.state.lock().await;
        let id = tstream_config::component_id(namespace, listener_name);
        state.reconciler.inject_event(&id, body)
    }

    fn validate(
        &self,
        raw: &Value,
        state: &WorkerState,
        namespace_to_update: Option<&str>,
    ) -> Result<Resolved> {
        let declaration = Declaration::from_value(raw.clone())?;
        let resolved = resolve_with_current(
            &declaration,
            state.reconciler.components(),
            namespace_to_update,
        )?;
        // Edge closure is structural in the resolver; double-check here so
        // a mapping bug can never reach the data plane
        debug_assert!(mappings_closed(&resolved));
        Ok(resolved)
    }

    /// Re-protect any plaintext secret fields before persistence
    fn protect_secrets(&self, raw: Value) -> Value {
        match raw {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    if key == "passphrase" {
                        if let Ok(secret) = serde_json::from_value::<Secret>(value.clone()) {
                            let protected = self.vault.protect(&secret);
                            if let Ok(encoded) = serde_json::to_value(&protected) {
                                out.insert(key, encoded);
                                continue;
                            }
                        }
                        out.insert(key, value);
                    } else {
                        out.insert(key, self.protect_secrets(value));
                    }
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.protect_secrets(v)).collect())
            }
            other => other,
        }
    }
}

/// Every mapping edge references an existing, enabled component
fn mappings_closed(resolved: &Resolved) -> bool {
    let enabled = |id: &str| {
        resolved
            .components
            .iter()
            .any(|c| c.id == id && c.enable)
    };
    resolved.mappings.iter().all(|(producer, consumers)| {
        enabled(producer) && consumers.iter().all(|c| enabled(c))
    })
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
