//! Poller worker
//!
//! One `Poller` per expanded system-poller component. Interval pollers run
//! on their own timer task; pull-mode pollers sit idle until a pull consumer
//! group calls [`Poller::fetch_once`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tstream_actions::ActionChain;
use tstream_config::{Component, ComponentKind, Connection, Credentials, Endpoint};
use tstream_http::{ClientPool, EndpointKey};
use tstream_protocol::{Record, SourceId};
use tstream_trace::Tracer;
use tstream_vault::SecretVault;

use crate::cycle::{self, device_context, merge_endpoint_results};
use crate::error::{PollerError, Result};

/// A configured poller, shared between its timer task and on-demand callers
pub struct Poller {
    id: SourceId,
    interval: u64,
    connection: Connection,
    credentials: Credentials,
    endpoints: Vec<Endpoint>,
    chain: ActionChain,
    tags: serde_json::Map<String, Value>,
    system_name: String,
    tracer: Option<Tracer>,
    pool: Arc<ClientPool>,
    vault: SecretVault,
    records_tx: mpsc::Sender<Record>,
    /// Overlap guard for scheduled cycles
    running: AtomicBool,
}

impl Poller {
    /// Build a poller from its expanded component
    pub fn from_component(
        component: &Component,
        pool: Arc<ClientPool>,
        vault: SecretVault,
        records_tx: mpsc::Sender<Record>,
    ) -> Result<Arc<Self>> {
        let ComponentKind::SystemPoller(spec) = &component.kind else {
            return Err(PollerError::NotAPoller {
                id: component.id.clone(),
            });
        };

        let endpoints = spec
            .endpoint_list
            .clone()
            .unwrap_or_else(cycle::default_endpoints);

        Ok(Arc::new(Self {
            id: SourceId::new(component.id.clone()),
            interval: spec.interval,
            connection: spec.connection.clone(),
            credentials: spec.credentials.clone(),
            endpoints,
            chain: ActionChain::new(&spec.data_opts.actions),
            tags: spec.data_opts.tags.clone(),
            system_name: spec.system_name.clone(),
            tracer: component.trace.output.as_deref().map(Tracer::new),
            pool,
            vault,
            records_tx,
            running: AtomicBool::new(false),
        }))
    }

    /// The poller's component id
    pub fn id(&self) -> &SourceId {
        &self.id
    }

    /// Whether this poller is only fired on demand
    pub fn is_pull_mode(&self) -> bool {
        self.interval == 0
    }

    /// Start the timer task; a no-op handle for pull-mode pollers
    pub fn spawn(self: Arc<Self>) -> PollerHandle {
        let cancel = CancellationToken::new();
        let task = if self.is_pull_mode() {
            None
        } else {
            let poller = Arc::clone(&self);
            let task_cancel = cancel.clone();
            Some(tokio::spawn(async move {
                poller.run(task_cancel).await;
            }))
        };
        PollerHandle {
            id: self.id.clone(),
            poller: self,
            cancel,
            task,
        }
    }

    /// Timer loop: jittered start, fixed interval, overlap guard
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let interval = Duration::from_secs(self.interval);
        let jitter = jitter_for(interval);

        tracing::info!(
            poller = %self.id,
            interval_secs = self.interval,
            jitter_ms = jitter.as_millis() as u64,
            "poller scheduled"
        );

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(jitter) => {}
        }

        let mut ticks = tokio::time::interval(interval);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticks.tick() => {
                    // Skip the tick if the previous cycle is still in flight
                    if self
                        .running
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
                        .is_err()
                    {
                        tracing::warn!(
                            poller = %self.id,
                            "previous cycle still running, tick skipped"
                        );
                        continue;
                    }

                    let poller = Arc::clone(&self);
                    tokio::spawn(async move {
                        match poller.fetch_once().await {
                            Ok(record) => {
                                if poller.records_tx.send(record).await.is_err() {
                                    tracing::warn!(
                                        poller = %poller.id,
                                        "record channel closed, poll result dropped"
                                    );
                                }
                            }
                            Err(e) => {
                                tracing::warn!(poller = %poller.id, error = %e, "poll cycle failed");
                            }
                        }
                        poller.running.store(false, Ordering::SeqCst);
                    });
                }
            }
        }

        tracing::info!(poller = %self.id, "poller stopped");
    }

    /// Run one poll cycle and build the record
    ///
    /// Shared by the timer loop and the pull-consumer on-demand path.
    pub async fn fetch_once(&self) -> Result<Record> {
        let key = EndpointKey {
            host: self.connection.host.clone(),
            port: self.connection.port,
            scheme: self.connection.protocol.as_str(),
            allow_self_signed_cert: self.connection.allow_self_signed_cert,
        };
        let client = self
            .pool
            .client_for(&key)
            .map_err(|e| PollerError::Endpoint {
                path: String::new(),
                source: e,
            })?;

        let passphrase = match &self.credentials.passphrase {
            Some(secret) => Some(self.vault.decrypt("passphrase", secret)?),
            None => None,
        };

        let mut results = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            if !endpoint.enable {
                continue;
            }
            match self
                .fetch_endpoint(&client, &key, endpoint, passphrase.as_ref())
                .await
            {
                Ok(value) => results.push((endpoint.name.clone(), value)),
                Err(e) => {
                    tracing::warn!(
                        poller = %self.id,
                        endpoint = %endpoint.path,
                        error = %e,
                        "endpoint fetch failed, continuing cycle"
                    );
                }
            }
        }

        let mut data = merge_endpoint_results(results);
        let context = device_context(&data, &self.connection.host, &self.system_name);
        if let Some(map) = data.as_object_mut() {
            map.insert("device".to_string(), context);
        }

        let mut record = Record::new("systemInfo", data, self.id.clone());
        record.merge_tags(self.tags.iter().map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        }));
        self.chain.apply(&mut record);

        if let Some(tracer) = &self.tracer
            && let Ok(value) = serde_json::to_value(&record)
        {
            tracer.write(&value);
        }

        Ok(record)
    }

    async fn fetch_endpoint(
        &self,
        client: &reqwest::Client,
        key: &EndpointKey,
        endpoint: &Endpoint,
        passphrase: Option<&secrecy::SecretString>,
    ) -> Result<Value> {
        let url = format!("{}{}", key.base_url(), endpoint.path);
        let mut request = client.get(&url);
        if let Some(username) = &self.credentials.username {
            request = request.basic_auth(
                username,
                passphrase.map(|secret| secret.expose_secret().to_string()),
            );
        }

        let response = request.send().await.map_err(|e| PollerError::Endpoint {
            path: endpoint.path.clone(),
            source: tstream_http::HttpError::Request(e),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollerError::Endpoint {
                path: endpoint.path.clone(),
                source: tstream_http::HttpError::status(status.as_u16(), url),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|_| PollerError::InvalidBody {
                path: endpoint.path.clone(),
            })
    }
}

/// Random startup jitter, bounded by the interval (capped at 30 s)
pub fn jitter_for(interval: Duration) -> Duration {
    if interval.is_zero() {
        return Duration::ZERO;
    }
    let cap = interval.min(Duration::from_secs(30));
    let millis = cap.as_millis().max(1) as u64;
    Duration::from_millis(rand::rng().random_range(0..millis))
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}

/// Handle to a spawned poller
pub struct PollerHandle {
    id: SourceId,
    poller: Arc<Poller>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// The poller's component id
    pub fn id(&self) -> &SourceId {
        &self.id
    }

    /// The shared poller, for on-demand cycles
    pub fn poller(&self) -> Arc<Poller> {
        Arc::clone(&self.poller)
    }

    /// Stop the timer task
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Some(task) = self.task {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
#[path = "poller_test.rs"]
mod tests;
