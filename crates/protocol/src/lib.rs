//! tstream - Protocol
//!
//! Canonical data types that flow through the pipeline.
//!
//! # Data model
//!
//! ```text
//! [Receivers]                 [Listeners]                 [Pipeline]
//!    TCP ────┐
//!    UDPv4 ──┼──→ RawData ──→ classify/parse ──→ Record ──→ consumers
//!    UDPv6 ──┘                                     ↑
//!                 [Pollers] ── normalize ──────────┘
//! ```
//!
//! `RawData` is the wire-level unit emitted by receivers: one framed line plus
//! sender metadata. `Record` is the canonical datum after classification and
//! parsing; everything downstream of a listener or poller deals in records.

mod category;
mod raw;
mod record;
mod source;

pub use category::EventCategory;
pub use raw::{RawData, TransportProtocol, sender_key};
pub use record::Record;
pub use source::SourceId;
