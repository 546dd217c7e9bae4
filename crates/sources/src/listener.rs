//! Event listener
//!
//! A logical listener bound to a port's receiver. For every frame: optional
//! match filter, category inference, key=value parsing, configured tags,
//! action chain, then a `Record` into the pipeline channel.

use regex::Regex;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tstream_actions::ActionChain;
use tstream_config::{Component, ComponentKind};
use tstream_protocol::{RawData, Record, SourceId};
use tstream_trace::Tracer;

use crate::DRAIN_WINDOW;
use crate::classify::{classify, parse_frame};
use crate::error::{Result, SourceError};

/// One logical event listener
pub struct EventListener {
    id: SourceId,
    port: u16,
    match_regex: Option<Regex>,
    tags: Map<String, Value>,
    chain: ActionChain,
    input_tracer: Option<Tracer>,
    output_tracer: Option<Tracer>,
    records_tx: mpsc::Sender<Record>,
}

impl EventListener {
    /// Build a listener from its expanded component
    ///
    /// # Errors
    ///
    /// Fails when the component is not a listener. The match pattern was
    /// validated at resolve time, so a compile failure here is treated the
    /// same way.
    pub fn from_component(
        component: &Component,
        records_tx: mpsc::Sender<Record>,
    ) -> Result<Self> {
        let ComponentKind::Listener(spec) = &component.kind else {
            return Err(SourceError::Io(std::io::Error::other(format!(
                "component '{}' is not a listener",
                component.id
            ))));
        };

        let match_regex = match &spec.match_pattern {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| SourceError::Io(std::io::Error::other(e.to_string())))?,
            ),
            None => None,
        };

        Ok(Self {
            id: SourceId::new(component.id.clone()),
            port: spec.port,
            match_regex,
            tags: spec.tags.clone(),
            chain: ActionChain::new(&spec.actions),
            input_tracer: component.trace.input.as_deref().map(Tracer::new),
            output_tracer: component.trace.output.as_deref().map(Tracer::new),
            records_tx,
        })
    }

    /// The component id this listener emits records under
    pub fn id(&self) -> &SourceId {
        &self.id
    }

    /// The port this listener is bound to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Spawn the listener over a receiver subscription
    pub fn spawn(self, frames: broadcast::Receiver<RawData>) -> ListenerHandle {
        let cancel = CancellationToken::new();
        let id = self.id.clone();
        let port = self.port;
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            self.run(frames, task_cancel).await;
        });
        ListenerHandle {
            id,
            port,
            cancel,
            task,
        }
    }

    async fn run(self, mut frames: broadcast::Receiver<RawData>, cancel: CancellationToken) {
        tracing::info!(listener = %self.id, port = self.port, "event listener started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = frames.recv() => {
                    match received {
                        Ok(raw) => self.handle(raw).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                listener = %self.id,
                                skipped,
                                "listener lagged, frames dropped"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        tracing::info!(listener = %self.id, "event listener stopped");
    }

    /// Process one frame into a record
    async fn handle(&self, raw: RawData) {
        if let Some(tracer) = &self.input_tracer {
            tracer.write_input(&raw.data, &raw.sender_key, raw.protocol.as_str());
        }

        let text = raw.as_text().into_owned();

        if let Some(regex) = &self.match_regex
            && !regex.is_match(&text)
        {
            return;
        }

        let category = classify(&text);
        let data = parse_frame(&text, category);

        let mut record = Record::new(category.as_str(), data, self.id.clone())
            .with_original_raw(text);
        record.merge_tags(self.tags.iter().map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        }));

        self.chain.apply(&mut record);

        if let Some(tracer) = &self.output_tracer
            && let Ok(value) = serde_json::to_value(&record)
        {
            tracer.write(&value);
        }

        if self.records_tx.send(record).await.is_err() {
            tracing::warn!(listener = %self.id, "record channel closed, frame dropped");
        }
    }
}

/// Handle to a spawned listener
pub struct ListenerHandle {
    id: SourceId,
    port: u16,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// The listener's component id
    pub fn id(&self) -> &SourceId {
        &self.id
    }

    /// The port the listener was bound to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop the listener, granting a short drain window
    ///
    /// Frames already handed to the listener get [`DRAIN_WINDOW`] to finish;
    /// anything still in flight after that is dropped with the task.
    pub async fn stop(self) {
        self.cancel.cancel();
        let abort = self.task.abort_handle();
        if tokio::time::timeout(DRAIN_WINDOW, self.task).await.is_err() {
            abort.abort();
            tracing::warn!(listener = %self.id, "listener did not drain in time, aborted");
        }
    }
}

#[cfg(test)]
#[path = "listener_test.rs"]
mod tests;
