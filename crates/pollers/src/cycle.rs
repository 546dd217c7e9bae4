//! Poll cycle
//!
//! One cycle resolves credentials, fetches every endpoint, merges the
//! responses keyed by endpoint name and wraps them with device context into
//! a `systemInfo` record.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tstream_config::Endpoint;
use tstream_normalize::{ArrayToMapOpts, array_to_map, get_value};

/// The well-known management paths polled when no endpoint list is declared
pub const DEFAULT_ENDPOINTS: &[(&str, &str)] = &[
    ("system", "/mgmt/tm/sys/global-settings"),
    ("version", "/mgmt/tm/sys/version"),
    ("cpu", "/mgmt/tm/sys/host-info"),
    ("memory", "/mgmt/tm/sys/memory"),
    ("virtualServers", "/mgmt/tm/ltm/virtual/stats"),
    ("pools", "/mgmt/tm/ltm/pool/stats"),
];

/// Build the default endpoint set
pub fn default_endpoints() -> Vec<Endpoint> {
    DEFAULT_ENDPOINTS
        .iter()
        .map(|(name, path)| Endpoint {
            name: (*name).to_string(),
            path: (*path).to_string(),
            enable: true,
        })
        .collect()
}

/// Merge per-endpoint responses into one object keyed by endpoint name
///
/// Failed endpoints are absent; the cycle still produces a record from
/// whatever succeeded.
pub fn merge_endpoint_results(results: Vec<(String, Value)>) -> Value {
    let mut merged = Map::with_capacity(results.len());
    for (name, value) in results {
        merged.insert(name, normalize_endpoint(value));
    }
    Value::Object(merged)
}

/// Normalize one endpoint response into a per-object map
///
/// Management endpoints answer collections as `{items: [...]}` where each
/// item carries its fully-qualified `fullPath` (`/partition/name`). Those
/// become maps keyed by full path; anything else passes through untouched.
fn normalize_endpoint(value: Value) -> Value {
    if !value.get("items").is_some_and(Value::is_array) {
        return value;
    }
    let opts: ArrayToMapOpts = serde_json::from_value(serde_json::json!({
        "keyName": "fullPath",
        "skipWhenKeyMissing": true,
    }))
    .expect("static options");
    // skipWhenKeyMissing hands the array back untouched; keep the original
    // response shape in that case
    match array_to_map(&value["items"], &opts) {
        Ok(mapped) if mapped.is_object() => mapped,
        _ => value,
    }
}

/// Attach device context to merged poll data
///
/// Hostname comes from the system endpoint when present, falling back to
/// the configured host; the poll timestamp is ISO-8601.
pub fn device_context(data: &Value, configured_host: &str, system_name: &str) -> Value {
    let hostname = match get_value(data, &["system", "hostname"]) {
        Value::String(s) if s != tstream_normalize::MISSING_DATA => s,
        _ => configured_host.to_string(),
    };
    let version = match get_value(data, &["version", "version"]) {
        Value::String(s) if s != tstream_normalize::MISSING_DATA => Value::String(s),
        _ => Value::String(tstream_normalize::MISSING_DATA.to_string()),
    };

    serde_json::json!({
        "hostname": hostname,
        "version": version,
        "systemName": system_name,
        "pollTimestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
