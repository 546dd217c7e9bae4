//! Raw inbound data
//!
//! `RawData` is emitted by a receiver for every framed line, before any
//! listener-level filtering or parsing. The `sender_key` groups frames from
//! one peer so partial fragments can be buffered and per-sender ordering
//! preserved.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Transport a frame arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProtocol {
    Tcp,
    Udp,
    Udp6,
}

impl TransportProtocol {
    /// Lowercase wire name, used in sender keys and trace records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Udp6 => "udp6",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the per-peer key `"<proto>-<addr>-<port>"`
///
/// ```
/// use tstream_protocol::{TransportProtocol, sender_key};
///
/// let peer = "10.0.0.2:51234".parse().unwrap();
/// assert_eq!(sender_key(TransportProtocol::Tcp, &peer), "tcp-10.0.0.2-51234");
/// ```
pub fn sender_key(protocol: TransportProtocol, peer: &SocketAddr) -> String {
    format!("{}-{}-{}", protocol, peer.ip(), peer.port())
}

/// One framed line as received off the wire
#[derive(Debug, Clone)]
pub struct RawData {
    /// Frame payload without the trailing newline
    pub data: Bytes,

    /// Per-peer key, see [`sender_key`]
    pub sender_key: String,

    /// Transport the frame arrived on
    pub protocol: TransportProtocol,

    /// Wall-clock receive time
    pub timestamp: DateTime<Utc>,

    /// Monotonic receive time, for latency measurements
    pub hrtime: Instant,
}

impl RawData {
    /// Create a raw datum stamped with the current time
    pub fn new(data: Bytes, sender_key: String, protocol: TransportProtocol) -> Self {
        Self {
            data,
            sender_key,
            protocol,
            timestamp: Utc::now(),
            hrtime: Instant::now(),
        }
    }

    /// Frame payload as UTF-8, lossy
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}
