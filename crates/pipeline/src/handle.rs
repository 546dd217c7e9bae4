//! Consumer handle
//!
//! The pipeline side of a consumer: its id, enable flag and the bounded
//! channel into its worker task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tstream_protocol::Record;

/// Handle to a registered consumer
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    id: String,
    enabled: bool,
    tx: mpsc::Sender<Record>,
}

impl ConsumerHandle {
    /// Create a handle over a consumer's record channel
    pub fn new(id: impl Into<String>, enabled: bool, tx: mpsc::Sender<Record>) -> Self {
        Self {
            id: id.into(),
            enabled,
            tx,
        }
    }

    /// The consumer's component id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the consumer receives dispatches
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the worker side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Remaining channel capacity
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Non-blocking enqueue
    pub fn try_send(&self, record: Record) -> Result<(), TrySendError<Record>> {
        self.tx.try_send(record)
    }
}
