//! Cloud access-token caching
//!
//! Cloud consumers authenticate with short-lived access tokens obtained
//! either by a JWT-bearer grant against a token endpoint (key-based service
//! accounts) or from the instance metadata service. Tokens are cached per
//! `token_id` (the key id, or the service email for metadata auth) and
//! refreshed ahead of expiry by a latency buffer.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::{HttpError, Result};

/// A token is only served while it outlives `now` by this buffer
pub const DEFAULT_LATENCY_BUFFER: Duration = Duration::from_secs(60);

/// Header required by the instance metadata service
pub const METADATA_FLAVOR_HEADER: (&str, &str) = ("Metadata-Flavor", "Google");

/// Total wait cap for instance metadata requests
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Token endpoint response body
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Cache of `token_id -> {access_token, expires_at}`
#[derive(Debug)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, CachedToken>>,
    latency_buffer: TimeDelta,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    /// Create a cache with the default 60 s latency buffer
    pub fn new() -> Self {
        Self::with_latency_buffer(DEFAULT_LATENCY_BUFFER)
    }

    /// Create a cache with an explicit latency buffer
    pub fn with_latency_buffer(buffer: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            latency_buffer: TimeDelta::from_std(buffer).unwrap_or(TimeDelta::zero()),
        }
    }

    /// Get a token iff `expires_at > now + latency_buffer`
    pub fn get(&self, token_id: &str) -> Option<String> {
        let entries = self.entries.lock();
        let entry = entries.get(token_id)?;
        if entry.expires_at > Utc::now() + self.latency_buffer {
            Some(entry.access_token.clone())
        } else {
            None
        }
    }

    /// Store a token with `expires_at = now + expires_in`
    ///
    /// Inserting also evicts every expired entry, so the cache never grows
    /// past the set of live token ids.
    pub fn insert(&self, token_id: impl Into<String>, access_token: String, expires_in: Duration) {
        let now = Utc::now();
        let expires_at =
            now + TimeDelta::from_std(expires_in).unwrap_or(TimeDelta::zero());

        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            token_id.into(),
            CachedToken {
                access_token,
                expires_at,
            },
        );
    }

    /// Remove one entry
    pub fn invalidate(&self, token_id: &str) {
        self.entries.lock().remove(token_id);
    }

    /// Empty the cache
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries, including expired ones not yet pruned
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// How a cloud consumer authenticates
#[derive(Debug, Clone)]
pub enum CloudAuth {
    /// JWT-bearer grant against a token endpoint
    JwtBearer {
        /// Key identifier, used as the cache key
        token_id: String,
        /// Token endpoint URL
        token_endpoint: String,
        /// Signed JWT assertion
        assertion: String,
    },
    /// Token from the instance metadata service
    InstanceMetadata {
        /// Service account email, used as the cache key
        service_email: String,
        /// Metadata service base URL
        metadata_url: String,
    },
}

impl CloudAuth {
    /// The cache key for this auth method
    pub fn token_id(&self) -> &str {
        match self {
            Self::JwtBearer { token_id, .. } => token_id,
            Self::InstanceMetadata { service_email, .. } => service_email,
        }
    }
}

/// Fetches and caches access tokens
pub struct TokenManager {
    cache: TokenCache,
    /// Client for token endpoints (pooled, normal keep-alive)
    token_client: reqwest::Client,
    /// Client for the metadata service: keep-alive disabled, 5 s cap
    metadata_client: reqwest::Client,
}

impl TokenManager {
    /// Build a manager with its two dedicated clients
    pub fn new() -> Result<Self> {
        let token_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(HttpError::Build)?;
        // The metadata socket must not be reused across requests
        let metadata_client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(METADATA_TIMEOUT)
            .build()
            .map_err(HttpError::Build)?;
        Ok(Self {
            cache: TokenCache::new(),
            token_client,
            metadata_client,
        })
    }

    /// The underlying cache
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Get a valid access token, fetching on cache miss
    pub async fn access_token(&self, auth: &CloudAuth) -> Result<String> {
        if let Some(token) = self.cache.get(auth.token_id()) {
            return Ok(token);
        }

        let response = match auth {
            CloudAuth::JwtBearer {
                token_endpoint,
                assertion,
                ..
            } => self.fetch_jwt_bearer(token_endpoint, assertion).await?,
            CloudAuth::InstanceMetadata {
                service_email,
                metadata_url,
            } => self.fetch_metadata(metadata_url, service_email).await?,
        };

        self.cache.insert(
            auth.token_id(),
            response.access_token.clone(),
            Duration::from_secs(response.expires_in),
        );
        Ok(response.access_token)
    }

    async fn fetch_jwt_bearer(
        &self,
        token_endpoint: &str,
        assertion: &str,
    ) -> Result<TokenResponse> {
        let response = self
            .token_client
            .post(token_endpoint)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::status(status.as_u16(), "token endpoint"));
        }
        parse_token_body(response).await
    }

    async fn fetch_metadata(
        &self,
        metadata_url: &str,
        service_email: &str,
    ) -> Result<TokenResponse> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/{}/token",
            metadata_url.trim_end_matches('/'),
            service_email
        );
        let response = self
            .metadata_client
            .get(&url)
            .header(METADATA_FLAVOR_HEADER.0, METADATA_FLAVOR_HEADER.1)
            .header(reqwest::header::CONNECTION, "close")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::status(status.as_u16(), "instance metadata"));
        }
        parse_token_body(response).await
    }
}

async fn parse_token_body(response: reqwest::Response) -> Result<TokenResponse> {
    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| HttpError::TokenResponse(e.to_string()))?;
    if body.access_token.is_empty() {
        return Err(HttpError::TokenResponse("empty access_token".into()));
    }
    Ok(body)
}
