//! Tag placeholder resolution
//!
//! `setTag` values may carry back-tick placeholders: `` `T` `` resolves to
//! the tenant and `` `A` `` to the application, both inferred from
//! fully-qualified object paths (`/Tenant/Application/name`) found in the
//! record data.

use serde_json::Value;

/// Maximum depth searched for a fully-qualified path
const MAX_SEARCH_DEPTH: usize = 4;

/// Infer `(tenant, application)` from the first fully-qualified path in the
/// data, looking at both keys and string values
pub fn infer_tenant_app(data: &Value) -> (Option<String>, Option<String>) {
    search(data, 0).unwrap_or((None, None))
}

fn search(data: &Value, depth: usize) -> Option<(Option<String>, Option<String>)> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                if let Some(found) = split_fq_path(key) {
                    return Some(found);
                }
                if let Value::String(s) = value
                    && let Some(found) = split_fq_path(s)
                {
                    return Some(found);
                }
            }
            for value in map.values() {
                if let Some(found) = search(value, depth + 1) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(|item| search(item, depth + 1)),
        Value::String(s) => split_fq_path(s).map(Some).unwrap_or(None),
        _ => None,
    }
}

/// Split `/Tenant/name` or `/Tenant/Application/name`
fn split_fq_path(text: &str) -> Option<(Option<String>, Option<String>)> {
    if !text.starts_with('/') {
        return None;
    }
    let segments: Vec<&str> = text[1..].split('/').collect();
    if segments.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
        return None;
    }
    match segments.len() {
        2 => Some((Some(segments[0].to_string()), None)),
        3 => Some((
            Some(segments[0].to_string()),
            Some(segments[1].to_string()),
        )),
        _ => None,
    }
}

/// Replace `` `T` ``/`` `A` `` in a tag value
///
/// Returns `None` when the value needs a placeholder that could not be
/// inferred, so the tag is omitted rather than emitted half-resolved.
pub fn resolve_placeholders(
    value: &str,
    tenant: Option<&str>,
    application: Option<&str>,
) -> Option<String> {
    let mut out = value.to_string();
    if out.contains("`T`") {
        out = out.replace("`T`", tenant?);
    }
    if out.contains("`A`") {
        out = out.replace("`A`", application?);
    }
    Some(out)
}
