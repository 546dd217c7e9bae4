//! Consumer worker
//!
//! One task per active consumer: reads from its bounded channel, applies the
//! consumer's filter and actions, traces, and invokes the adapter. Adapter
//! errors are logged and swallowed; nothing a consumer does can propagate
//! into the pipeline or another consumer.

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tstream_actions::ActionChain;
use tstream_config::{Component, ComponentKind};
use tstream_pipeline::{CONSUMER_CHANNEL_SIZE, ConsumerHandle};
use tstream_protocol::Record;
use tstream_trace::Tracer;
use tstream_vault::mask_value;

use crate::context::{Consumer, ConsumerContext, ConsumerError};
use crate::registry::ConsumerRegistry;

/// A running consumer: adapter, actions, channel and task
pub struct ConsumerWorker {
    id: String,
    handle: ConsumerHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConsumerWorker {
    /// Build and spawn a worker for an expanded consumer component
    ///
    /// # Errors
    ///
    /// Fails when the component is not a consumer or its type is unknown.
    pub fn spawn(
        component: &Component,
        registry: &ConsumerRegistry,
        metadata: Value,
    ) -> Result<Self, ConsumerError> {
        let ComponentKind::Consumer(spec) = &component.kind else {
            return Err(ConsumerError::init(format!(
                "component '{}' is not a consumer",
                component.id
            )));
        };

        let adapter = registry.create(spec)?;
        let chain = ActionChain::new(&spec.actions);
        let tracer = component.trace.output.as_deref().map(Tracer::new);
        let config = spec.config.clone();

        let (tx, rx) = mpsc::channel(CONSUMER_CHANNEL_SIZE);
        let handle = ConsumerHandle::new(component.id.clone(), component.enable, tx);
        let cancel = CancellationToken::new();

        let id = component.id.clone();
        let task = tokio::spawn(run_consumer(
            id.clone(),
            adapter,
            chain,
            config,
            tracer,
            metadata,
            rx,
            cancel.clone(),
        ));

        tracing::info!(consumer = %id, consumer_type = %spec.consumer_type, "consumer started");

        Ok(Self {
            id,
            handle,
            cancel,
            task,
        })
    }

    /// The consumer's component id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The pipeline-side handle for this consumer
    pub fn handle(&self) -> ConsumerHandle {
        self.handle.clone()
    }

    /// Stop the worker, letting queued records drain
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
        tracing::info!(consumer = %self.id, "consumer stopped");
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_consumer(
    id: String,
    adapter: Box<dyn Consumer>,
    chain: ActionChain,
    config: Map<String, Value>,
    tracer: Option<Tracer>,
    metadata: Value,
    mut rx: mpsc::Receiver<Record>,
    cancel: CancellationToken,
) {
    loop {
        let record = tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(record) => record,
                None => break,
            },
        };

        let mut record = record;
        if !adapter.accepts(&record) {
            continue;
        }
        chain.apply(&mut record);

        if let Some(tracer) = &tracer
            && let Ok(value) = serde_json::to_value(&record)
        {
            tracer.write(&value);
        }

        let ctx = ConsumerContext {
            event: record,
            config: &config,
            tracer: tracer.as_ref(),
            metadata: &metadata,
        };

        // ConsumerDispatchError contract: log, never propagate
        if let Err(e) = adapter.consume(ctx).await {
            tracing::warn!(
                consumer = %id,
                adapter = adapter.name(),
                config = %mask_value(&serde_json::Value::Object(config.clone())),
                error = %e,
                "consumer dispatch failed"
            );
        }
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
