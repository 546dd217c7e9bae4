//! tstream - Sources
//!
//! The push half of the agent: shared socket receivers and the logical event
//! listeners multiplexed onto them.
//!
//! # Architecture
//!
//! ```text
//!            ┌────────────────────────────┐
//!  port 6514 │ PortReceiver               │   broadcast    ┌──────────────┐
//!    TCP ───→│  accept/read, line framing ├───────────────→│ EventListener├─→ Record
//!    UDPv4 ─→│  per-sender fragments      │        └──────→│ EventListener├─→ Record
//!    UDPv6 ─→│  safe_restart (≤10)        │                └──────────────┘
//!            └────────────────────────────┘
//! ```
//!
//! One `PortReceiver` owns the TCP server and the dual UDP pair for a port;
//! every listener bound to that port sees every frame. The `ReceiverManager`
//! keys receivers by port and closes sockets when the last listener leaves.

mod classify;
mod error;
mod framing;
mod listener;
mod manager;
mod receiver;
mod state;

pub use classify::{classify, parse_key_value_pairs};
pub use error::{Result, SourceError};
pub use framing::FragmentBuffers;
pub use listener::{EventListener, ListenerHandle};
pub use manager::ReceiverManager;
pub use receiver::{PortReceiver, RESTART_DELAY};
pub use state::ReceiverState;

use std::time::Duration;

/// Well-known default listener port
pub const DEFAULT_PORT: u16 = 6514;

/// Cap on a per-sender partial fragment; larger frames are dropped
pub const MAX_FRAGMENT_BYTES: usize = 16 * 1024;

/// Drain window granted to a listener being removed
pub const DRAIN_WINDOW: Duration = Duration::from_secs(1);

/// Broadcast capacity between a receiver and its listeners
pub(crate) const BROADCAST_CAPACITY: usize = 1024;
