//! CSV conversion
//!
//! Some device endpoints (performance stats, iHealth exports) answer in CSV.
//! The first line is headers, subsequent lines are rows, empty lines are
//! skipped. `json_to_csv` is the inverse for a chosen header order.

use serde_json::{Map, Value};

/// Parse CSV text into an array of row objects
///
/// ```
/// use serde_json::json;
/// use tstream_normalize::csv_to_json;
///
/// let rows = csv_to_json("name,value\nvs1,10\n\nvs2,20\n");
/// assert_eq!(rows, json!([
///     {"name": "vs1", "value": "10"},
///     {"name": "vs2", "value": "20"},
/// ]));
/// ```
pub fn csv_to_json(text: &str) -> Value {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return Value::Array(Vec::new());
    };
    let headers: Vec<&str> = header_line.split(',').map(str::trim).collect();

    let mut rows = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let mut row = Map::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            let field = fields.get(i).copied().unwrap_or("");
            row.insert((*header).to_string(), Value::String(field.to_string()));
        }
        rows.push(Value::Object(row));
    }
    Value::Array(rows)
}

/// Emit rows back as CSV with a stable header order
///
/// Values outside the header set are dropped; missing values emit as empty
/// fields. Non-string scalars are rendered with their JSON representation.
pub fn json_to_csv(rows: &Value, headers: &[&str]) -> String {
    let mut out = String::new();
    out.push_str(&headers.join(","));
    out.push('\n');

    let Some(items) = rows.as_array() else {
        return out;
    };
    for item in items {
        let fields: Vec<String> = headers
            .iter()
            .map(|header| match item.get(*header) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            })
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}
