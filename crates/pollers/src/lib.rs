//! tstream - Pollers
//!
//! The pull half of the agent: per-poller timer tasks that fetch management
//! API endpoints on a schedule, normalize the responses and emit `systemInfo`
//! records into the pipeline.
//!
//! # Scheduling
//!
//! Each interval poller gets its own task. The first cycle fires after a
//! random jitter bounded by the interval, spreading load across devices that
//! share a config. Cycles for one poller are overlap-guarded: if the
//! previous cycle is still in flight when the tick fires, the tick is
//! skipped with a warning.
//!
//! Pull-mode pollers (`interval: 0`) are never scheduled; a pull consumer's
//! group drives them synchronously through [`Poller::fetch_once`].

mod cycle;
mod error;
mod poller;

pub use cycle::{DEFAULT_ENDPOINTS, device_context, merge_endpoint_results};
pub use error::{PollerError, Result};
pub use poller::{Poller, PollerHandle, jitter_for};
