//! Key filtering
//!
//! Restricts an object to an include list (substring match) or removes an
//! exclude list (exact match). The two are mutually exclusive. Filtering
//! recurses into nested objects; arrays are untouched.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{NormalizeError, Result};

/// Options for [`filter_keys`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterOpts {
    /// Keep only keys containing one of these substrings
    #[serde(default)]
    pub include: Option<Vec<String>>,

    /// Remove keys exactly equal to one of these
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

/// Filter an object's keys by include or exclude list
///
/// # Errors
///
/// Fails when both `include` and `exclude` are set, or neither.
pub fn filter_keys(data: &Value, opts: &FilterOpts) -> Result<Value> {
    match (&opts.include, &opts.exclude) {
        (Some(_), Some(_)) => Err(NormalizeError::invalid_options(
            "filter_keys",
            "include and exclude are mutually exclusive",
        )),
        (None, None) => Err(NormalizeError::invalid_options(
            "filter_keys",
            "one of include or exclude is required",
        )),
        (Some(include), None) => Ok(apply(data, &|key| {
            include.iter().any(|needle| key.contains(needle.as_str()))
        })),
        (None, Some(exclude)) => Ok(apply(data, &|key| {
            !exclude.iter().any(|name| name == key)
        })),
    }
}

fn apply(data: &Value, keep: &dyn Fn(&str) -> bool) -> Value {
    match data {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if keep(key) {
                    out.insert(key.clone(), apply(value, keep));
                }
            }
            Value::Object(out)
        }
        // Arrays are untouched
        other => other.clone(),
    }
}
