//! Application-security policy summaries

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Aggregate policy modification state
///
/// Any policy with `isModified: true` means changes are pending.
///
/// ```
/// use serde_json::json;
/// use tstream_normalize::asm_state;
///
/// assert_eq!(
///     asm_state(&json!([{"isModified": false}, {"isModified": true}])),
///     "Pending Policy Changes"
/// );
/// assert_eq!(asm_state(&json!([{"isModified": false}])), "Policies Consistent");
/// ```
pub fn asm_state(policies: &Value) -> String {
    let modified = policies
        .as_array()
        .is_some_and(|items| {
            items
                .iter()
                .any(|policy| policy.get("isModified").and_then(Value::as_bool) == Some(true))
        });
    if modified {
        "Pending Policy Changes".to_string()
    } else {
        "Policies Consistent".to_string()
    }
}

/// Most recent parseable `versionDatetime` across all policies, ISO-8601
/// with milliseconds. Empty input yields the empty string.
pub fn asm_last_change(policies: &Value) -> String {
    let latest: Option<DateTime<Utc>> = policies
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|policy| policy.get("versionDatetime")?.as_str())
        .filter_map(|text| text.parse::<DateTime<Utc>>().ok())
        .max();

    match latest {
        Some(datetime) => datetime.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => String::new(),
    }
}
