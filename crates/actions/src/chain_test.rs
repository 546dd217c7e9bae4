//! Action chain tests

use serde_json::json;
use tstream_config::ActionConfig;
use tstream_protocol::{Record, SourceId};

use crate::ActionChain;

fn actions(value: serde_json::Value) -> Vec<ActionConfig> {
    serde_json::from_value(value).unwrap()
}

fn record(data: serde_json::Value) -> Record {
    Record::new("event", data, SourceId::new("ns::listener"))
}

#[test]
fn test_empty_chain_is_noop() {
    let chain = ActionChain::empty();
    let mut rec = record(json!({"a": 1}));
    chain.apply(&mut rec);
    assert_eq!(rec.data, json!({"a": 1}));
    assert!(chain.is_empty());
}

#[test]
fn test_set_tag_literal() {
    let chain = ActionChain::new(&actions(json!([{"setTag": {"env": "prod"}}])));
    let mut rec = record(json!({}));
    chain.apply(&mut rec);
    assert_eq!(rec.tags.get("env").map(String::as_str), Some("prod"));
}

#[test]
fn test_set_tag_placeholders() {
    let chain = ActionChain::new(&actions(json!([
        {"setTag": {"tenant": "`T`", "application": "`A`"}}
    ])));
    let mut rec = record(json!({"virtual_name": "/Common/app1/vs1"}));
    chain.apply(&mut rec);
    assert_eq!(rec.tags.get("tenant").map(String::as_str), Some("Common"));
    assert_eq!(rec.tags.get("application").map(String::as_str), Some("app1"));
}

#[test]
fn test_unresolvable_placeholder_omits_tag() {
    let chain = ActionChain::new(&actions(json!([
        {"setTag": {"tenant": "`T`", "static": "yes"}}
    ])));
    let mut rec = record(json!({"no": "paths here"}));
    chain.apply(&mut rec);
    assert!(rec.tags.get("tenant").is_none());
    assert_eq!(rec.tags.get("static").map(String::as_str), Some("yes"));
}

#[test]
fn test_include_then_exclude_order() {
    let chain = ActionChain::new(&actions(json!([
        {"includeData": {}, "locations": {"system": true}},
        {"excludeData": {}, "locations": {"system": {"memory": true}}},
    ])));
    let mut rec = record(json!({
        "system": {"cpu": 1, "memory": 2},
        "virtualServers": {"vs1": {}},
    }));
    chain.apply(&mut rec);
    assert_eq!(rec.data, json!({"system": {"cpu": 1}}));
}

#[test]
fn test_disabled_action_skipped() {
    let chain = ActionChain::new(&actions(json!([
        {"enable": false, "excludeData": {}, "locations": {"system": true}}
    ])));
    assert!(chain.is_empty());

    let mut rec = record(json!({"system": 1}));
    chain.apply(&mut rec);
    assert_eq!(rec.data, json!({"system": 1}));
}

#[test]
fn test_jmespath_reshapes_data() {
    let chain = ActionChain::new(&actions(json!([
        {"JMESPath": {}, "expression": "{ message: hostname }"}
    ])));
    let mut rec = record(json!({"hostname": "bigip1", "noise": true}));
    chain.apply(&mut rec);
    assert_eq!(rec.data, json!({"message": "bigip1"}));
}

#[test]
fn test_invalid_jmespath_skipped_at_compile() {
    let chain = ActionChain::new(&actions(json!([
        {"JMESPath": {}, "expression": "][invalid"}
    ])));
    assert!(chain.is_empty());
}

#[test]
fn test_chain_continues_after_scalar_jmespath_result() {
    // A scalar JMESPath result replaces the data; later actions still run
    let chain = ActionChain::new(&actions(json!([
        {"JMESPath": {}, "expression": "hostname"},
        {"setTag": {"after": "ran"}},
    ])));
    let mut rec = record(json!({"hostname": "bigip1"}));
    chain.apply(&mut rec);
    assert_eq!(rec.data, json!("bigip1"));
    assert_eq!(rec.tags.get("after").map(String::as_str), Some("ran"));
}

#[test]
fn test_actions_apply_in_declared_order() {
    // Exclude after include of the same key removes everything
    let chain = ActionChain::new(&actions(json!([
        {"includeData": {}, "locations": {"a": true}},
        {"excludeData": {}, "locations": {"a": true}},
    ])));
    let mut rec = record(json!({"a": 1, "b": 2}));
    chain.apply(&mut rec);
    assert_eq!(rec.data, json!({}));
}
