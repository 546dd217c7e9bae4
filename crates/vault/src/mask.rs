//! Secret masking for logged and traced payloads
//!
//! Any field whose key is `passphrase` or `cipherText`, at any depth, is
//! replaced with the mask before the payload leaves the process. Traversal is
//! depth-tracked; past the cap the value is replaced with a sentinel instead
//! of recursing further.

use serde_json::Value;

/// Replacement for secret-keyed fields
pub const MASK: &str = "*********";

/// Sentinel written when traversal exceeds the depth cap
const CIRCULAR_REF: &str = "circularRefFound";

/// Maximum traversal depth
const MAX_DEPTH: usize = 10;

/// Keys whose values are always masked
const SECRET_KEYS: &[&str] = &["passphrase", "cipherText"];

/// Return a copy of `value` with all secret-keyed fields masked
///
/// ```
/// use serde_json::json;
/// use tstream_vault::{MASK, mask_value};
///
/// let masked = mask_value(&json!({"credentials": {"username": "admin", "passphrase": "s3cret"}}));
/// assert_eq!(masked["credentials"]["passphrase"], MASK);
/// assert_eq!(masked["credentials"]["username"], "admin");
/// ```
pub fn mask_value(value: &Value) -> Value {
    mask_at_depth(value, 0)
}

fn mask_at_depth(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String(CIRCULAR_REF.to_string());
    }

    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, inner) in map {
                if SECRET_KEYS.contains(&key.as_str()) {
                    out.insert(key.clone(), Value::String(MASK.to_string()));
                } else {
                    out.insert(key.clone(), mask_at_depth(inner, depth + 1));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| mask_at_depth(item, depth + 1))
                .collect(),
        ),
        other => other.clone(),
    }
}
