//! AI response cache.
//!
//! [`ResponseCache`] stores serialized model responses in the shared
//! key-value store under content-addressed [`CacheKey`]s. A hit skips the
//! quota and the model call entirely.
//!
//! A miss does not reserve its key: two concurrent identical requests can
//! both miss, both call the model, and the later `put` wins. Responses for
//! identical input are interchangeable, so this is accepted rather than
//! paying for a lock round-trip on every miss.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::key::CacheKey;
use crate::Result;
use crate::store::KeyValueStore;
use crate::telemetry;

/// Default retention of cached responses: 24 hours.
pub const DEFAULT_RESPONSE_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Configuration for the response cache.
///
/// ```rust
/// # use itinera::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new().ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for cached entries. Default: 24 hours.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_RESPONSE_TTL,
        }
    }
}

impl CacheConfig {
    /// Create a new config with the default TTL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Store-backed cache of AI responses.
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Configured retention.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Look up a cached response.
    ///
    /// Returns `None` on a miss. An entry that no longer deserializes into
    /// `T` (written by an older schema under the same version) counts as a
    /// miss and is overwritten by the next `put`.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let operation = key.operation();
        let raw = self.store.get(&key.to_string()).await?;

        let value = raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable cache entry");
                None
            }
        });

        if value.is_some() {
            debug!(key = %key, "cache hit");
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation).increment(1);
        } else {
            debug!(key = %key, "cache miss");
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation)
                .increment(1);
        }
        Ok(value)
    }

    /// Store a response under `key` for `ttl`, overwriting any previous value.
    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set_ex(&key.to_string(), &raw, ttl).await
    }

    /// Store a response with the configured TTL.
    pub async fn put_default<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        self.put(key, value, self.config.ttl).await
    }
}
