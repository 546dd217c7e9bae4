//! Device-shape helpers
//!
//! Small transforms over the raw management-API shapes: MAC normalization,
//! safe nested lookup and host CPU restructuring. Lookups that come up empty
//! return the string `"missing data"` rather than erroring.

use serde_json::{Map, Value};

/// Placeholder for values the device did not report
pub const MISSING_DATA: &str = "missing data";

/// Normalize a MAC address: uppercase, each octet left-padded to two hex
/// digits. Strings without a `:` pass through unchanged.
///
/// ```
/// use tstream_normalize::normalize_mac;
///
/// assert_eq!(normalize_mac("a:b:cc:d:ee:f"), "0A:0B:CC:0D:EE:0F");
/// assert_eq!(normalize_mac("no-colons"), "no-colons");
/// ```
pub fn normalize_mac(mac: &str) -> String {
    if !mac.contains(':') {
        return mac.to_string();
    }
    mac.split(':')
        .map(|octet| {
            let upper = octet.to_uppercase();
            if upper.len() == 1 {
                format!("0{upper}")
            } else {
                upper
            }
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// Walk a key path into nested objects
///
/// Returns `"missing data"` when any step is absent.
pub fn get_value(data: &Value, path: &[&str]) -> Value {
    let mut cursor = data;
    for key in path {
        match cursor.get(*key) {
            Some(next) => cursor = next,
            None => return Value::String(MISSING_DATA.to_string()),
        }
    }
    cursor.clone()
}

/// Restructure per-host CPU info from the stats tree
///
/// The device reports `entries` keyed by stat URL, each wrapping
/// `nestedStats.entries`. The output maps the trailing URL segment (the host
/// id) to its flattened entries. Absent input yields `"missing data"`.
pub fn restructure_host_cpu_info(data: &Value) -> Value {
    let Some(entries) = data.get("entries").and_then(Value::as_object) else {
        return Value::String(MISSING_DATA.to_string());
    };

    let mut out = Map::new();
    for (url, wrapper) in entries {
        let host = url.rsplit('/').next().unwrap_or(url);
        let stats = wrapper
            .pointer("/nestedStats/entries")
            .cloned()
            .unwrap_or_else(|| Value::String(MISSING_DATA.to_string()));
        out.insert(host.to_string(), stats);
    }

    if out.is_empty() {
        return Value::String(MISSING_DATA.to_string());
    }
    Value::Object(out)
}
