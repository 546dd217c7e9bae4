//! Event classification and parsing
//!
//! Category inference runs pattern heuristics over the raw text before any
//! parsing; the parser then extracts `key="value"` / `key=value` pairs into a
//! flat object, falling back to `{data: <raw>}` for free-form text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tstream_protocol::EventCategory;

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    // key="quoted value" or key=bare-value
    Regex::new(r#"([A-Za-z0-9_\-.]+)=(?:"([^"]*)"|([^\s,;]+))"#).expect("static pattern")
});

/// RFC3164-ish syslog head: `<PRI>` or `Mon dd hh:mm:ss host`
static SYSLOG_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:<\d{1,3}>|(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}\s)",
    )
    .expect("static pattern")
});

/// Infer the event category from raw text
///
/// Heuristics, first match wins:
/// - `virtual_name="..."` ⇒ LTM
/// - `policy_name="..."` ⇒ ASM
/// - `Access_Profile="..."` ⇒ APM
/// - `EOCTimestamp="..."` ⇒ AVR
/// - `lsn_event="..."` ⇒ CGNAT
/// - syslog-shaped head ⇒ syslog
/// - any key=value pairs ⇒ event
/// - otherwise ⇒ raw
pub fn classify(text: &str) -> EventCategory {
    const MARKERS: &[(&str, EventCategory)] = &[
        ("virtual_name=", EventCategory::Ltm),
        ("policy_name=", EventCategory::Asm),
        ("Access_Profile=", EventCategory::Apm),
        ("EOCTimestamp=", EventCategory::Avr),
        ("lsn_event=", EventCategory::Cgnat),
    ];
    for (marker, category) in MARKERS {
        if text.contains(marker) {
            return *category;
        }
    }
    if SYSLOG_SHAPE.is_match(text) {
        return EventCategory::Syslog;
    }
    if KEY_VALUE.is_match(text) {
        return EventCategory::Event;
    }
    EventCategory::Raw
}

/// Parse `key="value"` / `key=value` pairs into a flat object
///
/// Returns `None` when the text contains no pairs; callers wrap such text as
/// `{data: <raw>}`.
pub fn parse_key_value_pairs(text: &str) -> Option<Map<String, Value>> {
    let mut map = Map::new();
    for captures in KEY_VALUE.captures_iter(text) {
        let key = captures.get(1)?.as_str().to_string();
        let value = captures
            .get(2)
            .or_else(|| captures.get(3))
            .map(|m| m.as_str())
            .unwrap_or("");
        map.insert(key, Value::String(value.to_string()));
    }
    if map.is_empty() { None } else { Some(map) }
}

/// Parse a frame into the record data shape for its category
///
/// Syslog and raw frames pass through as `{data: <text>}`; everything else
/// gets the key=value treatment with the same fallback.
pub fn parse_frame(text: &str, category: EventCategory) -> Value {
    match category {
        EventCategory::Syslog | EventCategory::Raw => wrap_raw(text),
        _ => match parse_key_value_pairs(text) {
            Some(map) => Value::Object(map),
            None => wrap_raw(text),
        },
    }
}

fn wrap_raw(text: &str) -> Value {
    let mut map = Map::new();
    map.insert("data".to_string(), Value::String(text.to_string()));
    Value::Object(map)
}
