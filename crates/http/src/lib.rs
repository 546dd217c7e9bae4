//! tstream - HTTP
//!
//! Outbound HTTP plumbing shared by pollers and cloud consumers: a pool of
//! reusable per-endpoint clients and an access-token cache for OAuth-style
//! cloud authentication.

mod error;
mod pool;
mod token;

pub use error::{HttpError, Result};
pub use pool::{ClientPool, EndpointKey};
pub use token::{
    CloudAuth, TokenCache, TokenManager, TokenResponse, DEFAULT_LATENCY_BUFFER,
    METADATA_FLAVOR_HEADER, METADATA_TIMEOUT,
};

use std::time::Duration;

/// Default timeout for poller endpoint requests
pub const POLLER_TIMEOUT: Duration = Duration::from_secs(30);
