//! includeData / excludeData location filters
//!
//! `locations` is a tree whose leaves are `true`: include keeps only the
//! named sub-trees, exclude removes them. A branch in the locations tree
//! recurses into the corresponding branch of the data.

use serde_json::{Map, Value};

/// Keep only the sub-trees named by `locations`
///
/// A location leaf `true` keeps the whole value at that key; a nested object
/// recurses. Keys absent from the data are ignored.
pub fn include_locations(data: &Value, locations: &Value) -> Value {
    match (data, locations) {
        (Value::Object(map), Value::Object(wanted)) => {
            let mut out = Map::new();
            for (key, sub_locations) in wanted {
                let Some(value) = map.get(key) else {
                    continue;
                };
                match sub_locations {
                    Value::Bool(true) => {
                        out.insert(key.clone(), value.clone());
                    }
                    Value::Object(_) => {
                        let filtered = include_locations(value, sub_locations);
                        if !matches!(&filtered, Value::Object(m) if m.is_empty()) {
                            out.insert(key.clone(), filtered);
                        }
                    }
                    _ => {}
                }
            }
            Value::Object(out)
        }
        _ => data.clone(),
    }
}

/// Remove the sub-trees named by `locations`
pub fn exclude_locations(data: &Value, locations: &Value) -> Value {
    match (data, locations) {
        (Value::Object(map), Value::Object(unwanted)) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                match unwanted.get(key) {
                    Some(Value::Bool(true)) => {}
                    Some(nested @ Value::Object(_)) => {
                        out.insert(key.clone(), exclude_locations(value, nested));
                    }
                    _ => {
                        out.insert(key.clone(), value.clone());
                    }
                }
            }
            Value::Object(out)
        }
        _ => data.clone(),
    }
}
