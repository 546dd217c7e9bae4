//! Percent computation from paired keys
//!
//! Computes `round(partial / total * 100)` from two keys of an object,
//! optionally inverted (free vs used), optionally summing each key across
//! nested objects first (e.g. per-TMM memory).

use serde::Deserialize;
use serde_json::Value;

use crate::error::{NormalizeError, Result, shape_name};

/// Options for [`percent_from_keys`]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PercentOpts {
    /// Key holding the numerator
    #[serde(rename = "partialKey")]
    pub partial_key: String,

    /// Key holding the denominator
    #[serde(rename = "totalKey")]
    pub total_key: String,

    /// Report `100 - percent` instead
    #[serde(default)]
    pub inverse: bool,

    /// Sum each key across the object's nested objects first
    #[serde(rename = "nestedObjects", default)]
    pub nested_objects: bool,
}

/// Compute a rounded percentage from two keys
///
/// A zero total yields `0`, never a division error.
pub fn percent_from_keys(data: &Value, opts: &PercentOpts) -> Result<Value> {
    let Some(map) = data.as_object() else {
        return Err(NormalizeError::wrong_shape(
            "percent_from_keys",
            "object",
            shape_name(data),
        ));
    };

    let (partial, total) = if opts.nested_objects {
        let mut partial = 0.0;
        let mut total = 0.0;
        for value in map.values() {
            if let Some(nested) = value.as_object() {
                partial += number_at(nested, &opts.partial_key)?;
                total += number_at(nested, &opts.total_key)?;
            }
        }
        (partial, total)
    } else {
        (number_at(map, &opts.partial_key)?, number_at(map, &opts.total_key)?)
    };

    // total == 0 is pinned to 0 rather than NaN
    let mut percent = if total == 0.0 {
        0.0
    } else {
        (partial / total * 100.0).round()
    };
    if opts.inverse {
        percent = 100.0 - percent;
    }

    Ok(Value::from(percent as i64))
}

fn number_at(map: &serde_json::Map<String, Value>, key: &str) -> Result<f64> {
    map.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| NormalizeError::missing_key("percent_from_keys", key))
}
