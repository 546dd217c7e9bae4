//! Throughput performance stats
//!
//! The performance endpoint answers with duplicate row labels (the same
//! label for a packets row and a bits row) and CSV-ish value columns. The
//! pre-process step disambiguates duplicate labels; the post-process step
//! restricts values to `{average, current, max}` as floats and camelCases
//! the row labels.

use serde_json::{Map, Value};

/// Split duplicate-label rows into distinct keys
///
/// When a label's value is an array (duplicate rows merged upstream), each
/// element becomes its own entry, disambiguated by a `Packets`/`Bits` inner
/// key, falling back to a positional suffix.
pub fn throughput_pre_process(data: &Value) -> Value {
    let Some(map) = data.as_object() else {
        return data.clone();
    };

    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        match value.as_array() {
            Some(rows) => {
                for (i, row) in rows.iter().enumerate() {
                    let suffix = discriminator(row).unwrap_or_else(|| i.to_string());
                    out.insert(format!("{key} {suffix}"), row.clone());
                }
            }
            None => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(out)
}

/// Find a `Packets`/`Bits` discriminator among a row's keys
fn discriminator(row: &Value) -> Option<String> {
    let map = row.as_object()?;
    for needle in ["Packets", "Bits"] {
        if map.keys().any(|k| k.contains(needle)) {
            return Some(needle.to_string());
        }
    }
    None
}

/// Restrict rows to `{average, current, max}` floats under camelCase labels
///
/// Value keys are matched case-insensitively; other columns are dropped.
/// Label collisions after camelCasing are disambiguated with a numeric
/// suffix.
pub fn throughput_post_process(data: &Value) -> Value {
    let Some(map) = data.as_object() else {
        return data.clone();
    };

    let mut out = Map::with_capacity(map.len());
    for (label, row) in map {
        let Some(row_map) = row.as_object() else {
            continue;
        };

        let mut values = Map::new();
        for wanted in ["average", "current", "max"] {
            if let Some(value) = row_map
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
                .map(|(_, v)| v)
                && let Some(number) = coerce_f64(value)
            {
                values.insert(wanted.to_string(), Value::from(number));
            }
        }

        let mut new_label = camel_case(label);
        if out.contains_key(&new_label) {
            let mut n = 1;
            while out.contains_key(&format!("{new_label}{n}")) {
                n += 1;
            }
            new_label = format!("{new_label}{n}");
        }
        out.insert(new_label, Value::Object(values));
    }
    Value::Object(out)
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `"In Packets"` → `"inPackets"`, `"Service Requests"` → `"serviceRequests"`
fn camel_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for (i, word) in label.split_whitespace().enumerate() {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        if i == 0 {
            out.extend(first.to_lowercase());
        } else {
            out.extend(first.to_uppercase());
        }
        out.push_str(chars.as_str());
    }
    out
}
