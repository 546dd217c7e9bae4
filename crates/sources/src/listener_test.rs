//! Event listener tests
//!
//! Frames are injected through the manager so the full receiver → listener →
//! record path runs without real traffic.

use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tstream_config::{Declaration, resolve};
use tstream_protocol::Record;

use crate::listener::EventListener;
use crate::manager::ReceiverManager;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve a one-listener declaration and build the listener component
fn listener_component(name: &str, extra: serde_json::Value) -> tstream_config::Component {
    let mut object = json!({"class": "Telemetry_Listener"});
    object
        .as_object_mut()
        .unwrap()
        .extend(extra.as_object().unwrap().clone());
    let decl = Declaration::from_value(json!({
        "class": "Telemetry",
        name: object,
    }))
    .unwrap();
    let resolved = resolve(&decl).unwrap();
    resolved.components[0].clone()
}

async fn recv_record(rx: &mut mpsc::Receiver<Record>) -> Record {
    timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_frame_becomes_classified_record() {
    let manager = ReceiverManager::new();
    let component = listener_component("L1", json!({"port": 52330}));
    let (tx, mut rx) = mpsc::channel(16);

    let listener = EventListener::from_component(&component, tx).unwrap();
    let handle = listener.spawn(manager.subscribe(52330));

    manager
        .inject(52330, Bytes::from_static(b"virtual_name=\"/Common/vs1\""))
        .unwrap();

    let record = recv_record(&mut rx).await;
    assert_eq!(record.event_category, "LTM");
    assert_eq!(record.data["virtual_name"], "/Common/vs1");
    assert_eq!(record.source_id.as_str(), "f5telemetry_default::L1");
    assert!(record.original_raw.is_some());

    handle.stop().await;
    manager.shutdown().await;
}

/// Two listeners on the same port each independently receive the frame.
#[tokio::test]
async fn test_two_listeners_same_port_both_receive() {
    let manager = ReceiverManager::new();
    let (tx_a, mut rx_a) = mpsc::channel(16);
    let (tx_b, mut rx_b) = mpsc::channel(16);

    let a = EventListener::from_component(&listener_component("A", json!({"port": 52331})), tx_a)
        .unwrap();
    let b = EventListener::from_component(&listener_component("B", json!({"port": 52331})), tx_b)
        .unwrap();

    let handle_a = a.spawn(manager.subscribe(52331));
    let handle_b = b.spawn(manager.subscribe(52331));
    assert_eq!(manager.port_count(), 1);

    manager
        .inject(52331, Bytes::from_static(b"virtual_name=\"test\""))
        .unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        let record = recv_record(rx).await;
        assert_eq!(record.event_category, "LTM");
        assert_eq!(record.data["virtual_name"], "test");
    }

    handle_a.stop().await;
    handle_b.stop().await;
    manager.shutdown().await;
}

#[tokio::test]
async fn test_match_filter_drops_non_matching() {
    let manager = ReceiverManager::new();
    let component = listener_component("L", json!({"port": 52332, "match": "keepme"}));
    let (tx, mut rx) = mpsc::channel(16);

    let handle = EventListener::from_component(&component, tx)
        .unwrap()
        .spawn(manager.subscribe(52332));

    manager
        .inject(52332, Bytes::from_static(b"drop this frame"))
        .unwrap();
    manager
        .inject(52332, Bytes::from_static(b"keepme key=\"v\""))
        .unwrap();

    // Only the matching frame arrives
    let record = recv_record(&mut rx).await;
    assert!(record.original_raw.as_deref().unwrap().contains("keepme"));
    assert!(rx.try_recv().is_err());

    handle.stop().await;
    manager.shutdown().await;
}

#[tokio::test]
async fn test_configured_tags_merged() {
    let manager = ReceiverManager::new();
    let component = listener_component(
        "L",
        json!({"port": 52333, "tag": {"facility": "edge"}}),
    );
    let (tx, mut rx) = mpsc::channel(16);

    let handle = EventListener::from_component(&component, tx)
        .unwrap()
        .spawn(manager.subscribe(52333));

    manager
        .inject(52333, Bytes::from_static(b"key=\"value\""))
        .unwrap();

    let record = recv_record(&mut rx).await;
    assert_eq!(record.tags.get("facility").map(String::as_str), Some("edge"));

    handle.stop().await;
    manager.shutdown().await;
}

#[tokio::test]
async fn test_actions_applied_to_records() {
    let manager = ReceiverManager::new();
    let component = listener_component(
        "L",
        json!({
            "port": 52334,
            "actions": [
                {"setTag": {"env": "prod"}},
                {"excludeData": {}, "locations": {"noisy": true}},
            ],
        }),
    );
    let (tx, mut rx) = mpsc::channel(16);

    let handle = EventListener::from_component(&component, tx)
        .unwrap()
        .spawn(manager.subscribe(52334));

    manager
        .inject(52334, Bytes::from_static(b"noisy=\"x\" keep=\"y\""))
        .unwrap();

    let record = recv_record(&mut rx).await;
    assert_eq!(record.tags.get("env").map(String::as_str), Some("prod"));
    assert!(record.data.get("noisy").is_none());
    assert_eq!(record.data["keep"], "y");

    handle.stop().await;
    manager.shutdown().await;
}

#[tokio::test]
async fn test_free_text_wrapped_as_data() {
    let manager = ReceiverManager::new();
    let component = listener_component("L", json!({"port": 52335}));
    let (tx, mut rx) = mpsc::channel(16);

    let handle = EventListener::from_component(&component, tx)
        .unwrap()
        .spawn(manager.subscribe(52335));

    manager
        .inject(52335, Bytes::from_static(b"plain syslog style text"))
        .unwrap();

    let record = recv_record(&mut rx).await;
    assert_eq!(record.event_category, "raw");
    assert_eq!(record.data["data"], "plain syslog style text");

    handle.stop().await;
    manager.shutdown().await;
}
