//! Receiver manager
//!
//! Owns the `PortReceiver`s, keyed by port, and reference-counts the
//! listeners bound to each. The first listener on a port opens the sockets;
//! the last one out closes them; a listener replacement on a live port sees
//! no socket churn.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tstream_protocol::RawData;

use crate::error::{Result, SourceError};
use crate::receiver::PortReceiver;
use crate::state::ReceiverState;

struct PortEntry {
    receiver: Arc<PortReceiver>,
    subscribers: usize,
}

/// Registry of shared port receivers
#[derive(Default)]
pub struct ReceiverManager {
    ports: Mutex<HashMap<u16, PortEntry>>,
}

impl ReceiverManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener to a port, opening sockets on first use
    ///
    /// Returns the frame subscription. If the port's receiver is already
    /// running, no sockets are touched.
    pub fn subscribe(&self, port: u16) -> broadcast::Receiver<RawData> {
        let mut ports = self.ports.lock();
        let entry = ports.entry(port).or_insert_with(|| {
            let receiver = Arc::new(PortReceiver::new(port));
            Arc::clone(&receiver).start();
            tracing::debug!(port, "opened shared receiver");
            PortEntry {
                receiver,
                subscribers: 0,
            }
        });
        entry.subscribers += 1;
        entry.receiver.subscribe()
    }

    /// Release one subscription; the last release closes the sockets
    pub async fn unsubscribe(&self, port: u16) {
        let receiver = {
            let mut ports = self.ports.lock();
            let Some(entry) = ports.get_mut(&port) else {
                return;
            };
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers > 0 {
                return;
            }
            let entry = ports.remove(&port).expect("checked above");
            tracing::debug!(port, "last listener left, closing receiver");
            entry.receiver
        };
        receiver.stop().await;
    }

    /// Current state of a port's receiver
    pub fn receiver_state(&self, port: u16) -> Option<ReceiverState> {
        self.ports.lock().get(&port).map(|e| e.receiver.state())
    }

    /// Number of open ports
    pub fn port_count(&self) -> usize {
        self.ports.lock().len()
    }

    /// Inject a frame on a port, as if it arrived over the wire
    ///
    /// Backing for the debug injection endpoint.
    pub fn inject(&self, port: u16, data: Bytes) -> Result<()> {
        let ports = self.ports.lock();
        let entry = ports
            .get(&port)
            .ok_or(SourceError::UnknownPort { port })?;
        entry.receiver.inject(data);
        Ok(())
    }

    /// Stop every receiver
    pub async fn shutdown(&self) {
        let receivers: Vec<Arc<PortReceiver>> = {
            let mut ports = self.ports.lock();
            ports.drain().map(|(_, entry)| entry.receiver).collect()
        };
        for receiver in receivers {
            receiver.stop().await;
        }
    }
}

impl std::fmt::Debug for ReceiverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverManager")
            .field("ports", &self.port_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_port_shared_between_subscribers() {
        let manager = ReceiverManager::new();
        let _a = manager.subscribe(52320);
        let _b = manager.subscribe(52320);
        assert_eq!(manager.port_count(), 1);

        // First release keeps the sockets up
        manager.unsubscribe(52320).await;
        assert_eq!(manager.port_count(), 1);
        assert!(manager.receiver_state(52320).is_some());

        // Last release closes them
        manager.unsubscribe(52320).await;
        assert_eq!(manager.port_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_ports_distinct_receivers() {
        let manager = ReceiverManager::new();
        let _a = manager.subscribe(52321);
        let _b = manager.subscribe(52322);
        assert_eq!(manager.port_count(), 2);
        manager.shutdown().await;
        assert_eq!(manager.port_count(), 0);
    }

    #[tokio::test]
    async fn test_resubscribe_after_close_reopens() {
        let manager = ReceiverManager::new();
        let _a = manager.subscribe(52323);
        manager.unsubscribe(52323).await;

        let _b = manager.subscribe(52323);
        assert_eq!(manager.port_count(), 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_inject_unknown_port_errors() {
        let manager = ReceiverManager::new();
        let err = manager.inject(59999, Bytes::from_static(b"x")).unwrap_err();
        assert!(err.to_string().contains("59999"));
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_port_is_noop() {
        let manager = ReceiverManager::new();
        manager.unsubscribe(51000).await;
    }
}
