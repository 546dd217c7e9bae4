//! Pool/WideIP member restructuring
//!
//! The device reports pool members twice: a stats side keyed by stat URLs
//! containing `/members/<vs>:<server>/stats` fragments, and an item side
//! (`items`) carrying configuration metadata. This transform joins the two
//! into one map keyed by member name.

use serde_json::{Map, Value};

/// Join member stats with item metadata under `membersReference`
///
/// Input shape:
///
/// ```text
/// {
///   "membersReference": {
///     "entries": { "<selfLink>/members/<vs>:<server>/stats": {"nestedStats": {...}}, ... },
///     "items":   [ {"name": "<vs>:<server>", ...config}, ... ]
///   }
/// }
/// ```
///
/// Output replaces `membersReference` with `members`, keyed by member name,
/// each value merging the flattened stats with the item's metadata. Entries
/// with no matching item keep their stats alone; items with no stats entry
/// are kept with metadata alone.
pub fn restructure_member_refs(data: &Value) -> Value {
    let Some(reference) = data.get("membersReference") else {
        return data.clone();
    };

    let mut members: Map<String, Value> = Map::new();

    if let Some(entries) = reference.get("entries").and_then(Value::as_object) {
        for (url, wrapper) in entries {
            let Some(name) = member_name_from_url(url) else {
                continue;
            };
            let stats = wrapper
                .pointer("/nestedStats/entries")
                .cloned()
                .unwrap_or_else(|| wrapper.clone());
            members.insert(name, stats);
        }
    }

    if let Some(items) = reference.get("items").and_then(Value::as_array) {
        for item in items {
            let Some(name) = item.get("name").and_then(Value::as_str) else {
                continue;
            };
            let Some(item_map) = item.as_object() else {
                continue;
            };
            let merged = members
                .entry(name.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(target) = merged.as_object_mut() {
                for (key, value) in item_map {
                    target.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
    }

    let mut out = data.as_object().cloned().unwrap_or_default();
    out.shift_remove("membersReference");
    out.insert("members".to_string(), Value::Object(members));
    Value::Object(out)
}

/// Extract `<vs>:<server>` from a `/members/<vs>:<server>/stats` fragment
fn member_name_from_url(url: &str) -> Option<String> {
    let start = url.find("/members/")? + "/members/".len();
    let rest = &url[start..];
    let end = rest.find("/stats").unwrap_or(rest.len());
    let raw = &rest[..end];
    // Self-links encode '/' as '~' in member names
    Some(raw.replace('~', "/"))
}
