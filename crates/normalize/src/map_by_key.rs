//! Array-to-map conversion
//!
//! Device endpoints return lists of named objects; downstream processing
//! wants them keyed. `array_to_map` builds the map from one key or from an
//! ordered list of keys joined with `_`.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{NormalizeError, Result, shape_name};

/// Options for [`array_to_map`]
#[derive(Debug, Clone, Deserialize)]
pub struct ArrayToMapOpts {
    /// Key name(s) whose values form the map key
    #[serde(rename = "keyName")]
    pub key_names: KeyNames,

    /// Prefix prepended to every produced map key
    #[serde(rename = "keyNamePrefix", default)]
    pub key_name_prefix: Option<String>,

    /// Return the input unchanged when an item lacks the key
    #[serde(rename = "skipWhenKeyMissing", default)]
    pub skip_when_key_missing: bool,
}

/// One key name or an ordered list joined with `_`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeyNames {
    One(String),
    Many(Vec<String>),
}

impl KeyNames {
    fn as_slice(&self) -> Vec<&str> {
        match self {
            Self::One(name) => vec![name.as_str()],
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Convert an array of objects into a map keyed by the named field(s)
///
/// # Errors
///
/// Fails when the input is not an array, or when an item lacks the key and
/// `skip_when_key_missing` is off.
///
/// ```
/// use serde_json::json;
/// use tstream_normalize::{ArrayToMapOpts, array_to_map};
///
/// let opts: ArrayToMapOpts = serde_json::from_value(json!({"keyName": "n"})).unwrap();
/// let out = array_to_map(&json!([{"n": "a", "v": 1}, {"n": "b", "v": 2}]), &opts).unwrap();
/// assert_eq!(out["a"]["v"], 1);
/// assert_eq!(out["b"]["v"], 2);
/// ```
pub fn array_to_map(data: &Value, opts: &ArrayToMapOpts) -> Result<Value> {
    let Some(items) = data.as_array() else {
        return Err(NormalizeError::wrong_shape(
            "array_to_map",
            "array",
            shape_name(data),
        ));
    };

    let key_names = opts.key_names.as_slice();
    let mut out = Map::with_capacity(items.len());

    for item in items {
        let mut parts = Vec::with_capacity(key_names.len());
        for key_name in &key_names {
            match item.get(key_name).and_then(value_as_key) {
                Some(part) => parts.push(part),
                None => {
                    if opts.skip_when_key_missing {
                        return Ok(data.clone());
                    }
                    return Err(NormalizeError::missing_key("array_to_map", *key_name));
                }
            }
        }

        let mut key = parts.join("_");
        if let Some(prefix) = &opts.key_name_prefix {
            key = format!("{prefix}{key}");
        }
        out.insert(key, item.clone());
    }

    Ok(Value::Object(out))
}

/// Scalar value as a map key
fn value_as_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
