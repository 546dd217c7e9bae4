//! Per-endpoint client pool
//!
//! `reqwest::Client` holds a connection pool internally, so the win here is
//! reusing one client per distinct endpoint configuration instead of
//! rebuilding TLS state on every poll cycle. Clients are keyed by the
//! connection parameters that affect their construction.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{HttpError, Result};
use crate::POLLER_TIMEOUT;

/// Connection parameters that select a pooled client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub host: String,
    pub port: u16,
    /// `http` or `https`
    pub scheme: &'static str,
    pub allow_self_signed_cert: bool,
}

impl EndpointKey {
    /// Base URL for this endpoint
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Pool of reusable per-endpoint clients
#[derive(Debug, Default)]
pub struct ClientPool {
    clients: Mutex<HashMap<EndpointKey, reqwest::Client>>,
    timeout: Option<Duration>,
}

impl ClientPool {
    /// Create a pool with the default poller timeout
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            timeout: Some(POLLER_TIMEOUT),
        }
    }

    /// Create a pool with an explicit per-request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            timeout: Some(timeout),
        }
    }

    /// Get the client for an endpoint, building it on first use
    ///
    /// `reqwest::Client` is internally reference-counted; the returned clone
    /// shares the pooled connections.
    pub fn client_for(&self, key: &EndpointKey) -> Result<reqwest::Client> {
        if let Some(client) = self.clients.lock().get(key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if key.allow_self_signed_cert {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(HttpError::Build)?;

        tracing::debug!(
            host = %key.host,
            port = key.port,
            scheme = key.scheme,
            "built pooled HTTP client"
        );

        self.clients
            .lock()
            .entry(key.clone())
            .or_insert(client.clone());
        Ok(client)
    }

    /// Drop the client for an endpoint (e.g. after its component is removed)
    pub fn evict(&self, key: &EndpointKey) {
        self.clients.lock().remove(key);
    }

    /// Number of pooled clients
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}
