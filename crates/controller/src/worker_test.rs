//! Config worker tests
//!
//! These run the whole control plane against in-memory storage and a
//! capturing consumer adapter, with real sockets only where a listener port
//! is declared.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tstream_consumers::{Consumer, ConsumerContext, ConsumerError, ConsumerRegistry};
use tstream_http::ClientPool;
use tstream_pipeline::Pipeline;
use tstream_protocol::Record;
use tstream_sources::ReceiverManager;
use tstream_vault::SecretVault;

use crate::reconciler::Reconciler;
use crate::storage::{CONFIG_KEY, MemoryStorage, Storage};
use crate::worker::{ConfigEvent, ConfigWorker, ProcessOptions};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct CapturingConsumer {
    records: mpsc::UnboundedSender<Record>,
}

#[async_trait]
impl Consumer for CapturingConsumer {
    fn name(&self) -> &'static str {
        "capturing"
    }

    async fn consume(&self, ctx: ConsumerContext<'_>) -> Result<(), ConsumerError> {
        let _ = self.records.send(ctx.event);
        Ok(())
    }
}

struct Harness {
    worker: Arc<ConfigWorker>,
    storage: Arc<MemoryStorage>,
    captured: mpsc::UnboundedReceiver<Record>,
    cancel: CancellationToken,
}

fn harness() -> Harness {
    let manager = Arc::new(ReceiverManager::new());
    let pipeline = Arc::new(Pipeline::new());

    let (records_tx, records_rx) = mpsc::channel(1024);
    let cancel = CancellationToken::new();
    tokio::spawn(Arc::clone(&pipeline).run(records_rx, cancel.clone()));

    let (captured_tx, captured) = mpsc::unbounded_channel();
    let mut registry = ConsumerRegistry::with_builtins();
    registry.register("capturing", move |_spec| {
        Ok(Box::new(CapturingConsumer {
            records: captured_tx.clone(),
        }))
    });

    let reconciler = Reconciler::new(
        manager,
        pipeline,
        registry,
        Arc::new(ClientPool::new()),
        SecretVault::new(),
        records_tx,
    );
    let storage = Arc::new(MemoryStorage::new());
    let worker = Arc::new(ConfigWorker::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        SecretVault::new(),
        reconciler,
    ));
    worker.set_debug(true);

    Harness {
        worker,
        storage,
        captured,
        cancel,
    }
}

fn listener_and_consumer(port: u16) -> Value {
    json!({
        "class": "Telemetry",
        "My_Listener": {"class": "Telemetry_Listener", "port": port},
        "My_Consumer": {"class": "Telemetry_Consumer", "type": "capturing"},
    })
}

/// Empty declaration after a failed load: no components, no mappings, no
/// errors.
#[tokio::test]
async fn test_load_fallback_to_empty() {
    let h = harness();
    h.storage
        .save(CONFIG_KEY, &json!({"raw": {"class": "NotTelemetry"}}))
        .await
        .unwrap();

    let outcome = h.worker.load().await.unwrap();
    assert_eq!(outcome.components, 0);

    // The stored blob was not overwritten by the fallback
    let stored = h.storage.load(CONFIG_KEY).await.unwrap().unwrap();
    assert_eq!(stored["raw"]["class"], "NotTelemetry");

    h.worker.shutdown().await;
    h.cancel.cancel();
}

#[tokio::test]
async fn test_load_rehydrates_stored_declaration() {
    let h = harness();
    h.storage
        .save(CONFIG_KEY, &json!({"raw": listener_and_consumer(52360)}))
        .await
        .unwrap();

    let outcome = h.worker.load().await.unwrap();
    assert_eq!(outcome.components, 2);

    h.worker.shutdown().await;
    h.cancel.cancel();
}

#[tokio::test]
async fn test_process_emits_event_sequence() {
    let h = harness();
    let mut events = h.worker.events();

    h.worker
        .process_declaration(listener_and_consumer(52361), ProcessOptions::save())
        .await
        .unwrap();

    let received = events.recv().await.unwrap();
    let succeeded = events.recv().await.unwrap();
    let changed = events.recv().await.unwrap();

    let tx0 = match received {
        ConfigEvent::Received { transaction_id, .. } => transaction_id,
        other => panic!("expected Received, got {other:?}"),
    };
    match succeeded {
        ConfigEvent::ValidationSucceed { transaction_id, .. } => {
            assert_eq!(transaction_id, tx0);
        }
        other => panic!("expected ValidationSucceed, got {other:?}"),
    }
    match changed {
        ConfigEvent::Change {
            transaction_id,
            components,
            ..
        } => {
            assert_eq!(transaction_id, tx0);
            assert_eq!(components, 2);
        }
        other => panic!("expected Change, got {other:?}"),
    }

    h.worker.shutdown().await;
    h.cancel.cancel();
}

#[tokio::test]
async fn test_invalid_declaration_fails_and_persists_nothing() {
    let h = harness();
    let mut events = h.worker.events();

    let err = h
        .worker
        .process_declaration(
            json!({"class": "Telemetry", "bad": 42}),
            ProcessOptions::save(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("additionalProperties"));

    // Received then ValidationFailed, nothing stored
    assert!(matches!(
        events.recv().await.unwrap(),
        ConfigEvent::Received { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        ConfigEvent::ValidationFailed { .. }
    ));
    assert!(h.storage.load(CONFIG_KEY).await.unwrap().is_none());

    h.cancel.cancel();
}

#[tokio::test]
async fn test_get_declaration_and_namespace_slice() {
    let h = harness();
    h.worker
        .process_declaration(
            json!({
                "class": "Telemetry",
                "Root_C": {"class": "Telemetry_Consumer", "type": "default"},
                "My_NS": {
                    "class": "Telemetry_Namespace",
                    "C": {"class": "Telemetry_Consumer", "type": "default"},
                },
            }),
            ProcessOptions::default(),
        )
        .await
        .unwrap();

    let full = h.worker.get_declaration(None).await.unwrap();
    assert_eq!(full["class"], "Telemetry");

    let ns = h.worker.get_declaration(Some("My_NS")).await.unwrap();
    assert!(ns.get("C").is_some());

    let err = h.worker.get_declaration(Some("Missing")).await.unwrap_err();
    assert!(err.to_string().contains("Missing"));

    h.worker.shutdown().await;
    h.cancel.cancel();
}

#[tokio::test]
async fn test_namespace_declaration_merges() {
    let h = harness();
    h.worker
        .process_declaration(listener_and_consumer(52362), ProcessOptions::default())
        .await
        .unwrap();

    let outcome = h
        .worker
        .process_namespace_declaration(
            json!({"NS_C": {"class": "Telemetry_Consumer", "type": "default"}}),
            "My_NS",
            ProcessOptions::default(),
        )
        .await
        .unwrap();
    // Root listener + root consumer + namespaced consumer
    assert_eq!(outcome.components, 3);

    // Root objects survived the namespace-scoped apply
    let full = h.worker.get_declaration(None).await.unwrap();
    assert!(full.get("My_Listener").is_some());
    assert!(full.get("My_NS").is_some());

    h.worker.shutdown().await;
    h.cancel.cancel();
}

#[tokio::test]
async fn test_plain_secret_protected_before_persist() {
    let h = harness();
    h.worker
        .process_declaration(
            json!({
                "class": "Telemetry",
                "S": {
                    "class": "Telemetry_System",
                    "username": "admin",
                    "passphrase": "plaintext-secret",
                },
            }),
            ProcessOptions::save(),
        )
        .await
        .unwrap();

    let stored = h.storage.load(CONFIG_KEY).await.unwrap().unwrap();
    let passphrase = &stored["raw"]["S"]["passphrase"];
    assert!(passphrase.get("cipherText").is_some());
    assert_eq!(passphrase["protected"], "SecureVault");
    assert_ne!(passphrase["cipherText"], "plaintext-secret");

    h.worker.shutdown().await;
    h.cancel.cancel();
}

#[tokio::test]
async fn test_cleanup_drops_state_and_blob() {
    let h = harness();
    h.worker
        .process_declaration(listener_and_consumer(52363), ProcessOptions::save())
        .await
        .unwrap();
    assert!(h.storage.load(CONFIG_KEY).await.unwrap().is_some());

    h.worker.cleanup().await.unwrap();
    assert!(h.storage.load(CONFIG_KEY).await.unwrap().is_none());
    assert!(h.worker.components().await.is_empty());

    h.cancel.cancel();
}

/// End-to-end: injected frame → listener → pipeline → capturing consumer.
#[tokio::test]
async fn test_injected_event_reaches_consumer() {
    let mut h = harness();
    h.worker
        .process_declaration(listener_and_consumer(52364), ProcessOptions::default())
        .await
        .unwrap();

    h.worker
        .inject_event(
            "f5telemetry_default",
            "My_Listener",
            Bytes::from_static(b"virtual_name=\"test\""),
        )
        .await
        .unwrap();

    let record = timeout(RECV_TIMEOUT, h.captured.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.event_category, "LTM");
    assert_eq!(record.data["virtual_name"], "test");

    h.worker.shutdown().await;
    h.cancel.cancel();
}

/// Reapplying the same declaration must not churn sockets: the injected
/// frame still flows after a no-op reconcile.
#[tokio::test]
async fn test_unchanged_reapply_keeps_listener_running() {
    let mut h = harness();
    let decl = listener_and_consumer(52365);
    h.worker
        .process_declaration(decl.clone(), ProcessOptions::default())
        .await
        .unwrap();
    h.worker
        .process_declaration(decl, ProcessOptions::default())
        .await
        .unwrap();

    h.worker
        .inject_event(
            "f5telemetry_default",
            "My_Listener",
            Bytes::from_static(b"key=\"value\""),
        )
        .await
        .unwrap();

    let record = timeout(RECV_TIMEOUT, h.captured.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.event_category, "event");

    h.worker.shutdown().await;
    h.cancel.cancel();
}

/// A removed consumer stops receiving; the surviving listener keeps flowing
/// to the remaining consumer.
#[tokio::test]
async fn test_removed_consumer_torn_down() {
    let mut h = harness();
    h.worker
        .process_declaration(
            json!({
                "class": "Telemetry",
                "L": {"class": "Telemetry_Listener", "port": 52366},
                "Keep": {"class": "Telemetry_Consumer", "type": "capturing"},
                "Drop": {"class": "Telemetry_Consumer", "type": "capturing"},
            }),
            ProcessOptions::default(),
        )
        .await
        .unwrap();

    h.worker
        .process_declaration(
            json!({
                "class": "Telemetry",
                "L": {"class": "Telemetry_Listener", "port": 52366},
                "Keep": {"class": "Telemetry_Consumer", "type": "capturing"},
            }),
            ProcessOptions::default(),
        )
        .await
        .unwrap();

    h.worker
        .inject_event("f5telemetry_default", "L", Bytes::from_static(b"k=\"v\""))
        .await
        .unwrap();

    // Exactly one copy arrives (only "Keep" is mapped)
    let record = timeout(RECV_TIMEOUT, h.captured.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.data["k"], "v");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.captured.try_recv().is_err());

    h.worker.shutdown().await;
    h.cancel.cancel();
}

#[tokio::test]
async fn test_injection_gated_by_debug() {
    let h = harness();
    h.worker
        .process_declaration(listener_and_consumer(52367), ProcessOptions::default())
        .await
        .unwrap();

    h.worker.set_debug(false);
    let err = h
        .worker
        .inject_event(
            "f5telemetry_default",
            "My_Listener",
            Bytes::from_static(b"nope"),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("debug"));

    h.worker.shutdown().await;
    h.cancel.cancel();
}

#[tokio::test]
async fn test_scrape_drives_pull_pollers() {
    let h = harness();
    h.worker
        .process_declaration(
            json!({
                "class": "Telemetry",
                "PC": {
                    "class": "Telemetry_Pull_Consumer",
                    "type": "default",
                    "systemPoller": "P",
                },
                // Nothing listens on this port; the cycle still yields a
                // record with device context
                "P": {
                    "class": "Telemetry_System_Poller",
                    "interval": 0,
                    "host": "127.0.0.1",
                    "port": 1,
                    "protocol": "http",
                },
            }),
            ProcessOptions::default(),
        )
        .await
        .unwrap();

    let records = h
        .worker
        .scrape("f5telemetry_default", "PC")
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event_category, "systemInfo");

    let err = h
        .worker
        .scrape("f5telemetry_default", "Nope")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));

    h.worker.shutdown().await;
    h.cancel.cancel();
}
