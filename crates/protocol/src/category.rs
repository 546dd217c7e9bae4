//! Event categories
//!
//! Every record carries a `telemetryEventCategory`. Listeners infer the
//! category from the raw text; pollers always emit `systemInfo`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known event categories
///
/// The empty string is reserved for unclassified data and never constructed
/// here; `Event` is the classifier fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Periodic device snapshot produced by a poller
    #[serde(rename = "systemInfo")]
    SystemInfo,
    /// Local traffic manager events (`virtual_name="..."`)
    #[serde(rename = "LTM")]
    Ltm,
    /// Application security events (`policy_name="..."`)
    #[serde(rename = "ASM")]
    Asm,
    /// Access policy events (`Access_Profile="..."`)
    #[serde(rename = "APM")]
    Apm,
    /// Analytics/visibility events (`EOCTimestamp="..."`)
    #[serde(rename = "AVR")]
    Avr,
    /// Carrier-grade NAT events (`lsn_event="..."`)
    #[serde(rename = "CGNAT")]
    Cgnat,
    /// Syslog-shaped text passed through unparsed
    #[serde(rename = "syslog")]
    Syslog,
    /// Raw text that matched no heuristic and had no key=value pairs
    #[serde(rename = "raw")]
    Raw,
    /// Default category for parsed key=value events
    #[serde(rename = "event")]
    Event,
}

impl EventCategory {
    /// Category name as it appears in `telemetryEventCategory`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemInfo => "systemInfo",
            Self::Ltm => "LTM",
            Self::Asm => "ASM",
            Self::Apm => "APM",
            Self::Avr => "AVR",
            Self::Cgnat => "CGNAT",
            Self::Syslog => "syslog",
            Self::Raw => "raw",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_names_match_wire_form() {
        let json = serde_json::to_string(&EventCategory::SystemInfo).unwrap();
        assert_eq!(json, "\"systemInfo\"");
        let json = serde_json::to_string(&EventCategory::Ltm).unwrap();
        assert_eq!(json, "\"LTM\"");
    }

    #[test]
    fn test_as_str_round_trip() {
        for cat in [
            EventCategory::SystemInfo,
            EventCategory::Ltm,
            EventCategory::Asm,
            EventCategory::Apm,
            EventCategory::Avr,
            EventCategory::Cgnat,
            EventCategory::Syslog,
            EventCategory::Raw,
            EventCategory::Event,
        ] {
            let parsed: EventCategory =
                serde_json::from_str(&format!("\"{}\"", cat.as_str())).unwrap();
            assert_eq!(parsed, cat);
        }
    }
}
