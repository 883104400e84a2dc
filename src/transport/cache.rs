//! Opt-in short-term memoization for boundary responses.
//!
//! [`RequestCache`] remembers recent successful responses so that bursts of
//! identical requests (e.g. the same strategy tag looked up from two widgets
//! within seconds) cross the boundary once. It sits *below* the orchestrator
//! cache and survives orchestrator invalidation, so enable it only when that
//! double-fetch guard is actually wanted — the transport is cache-agnostic
//! by default.

use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;

/// Configuration for the transport's memoization layer.
///
/// ```rust
/// # use hintbridge::transport::RequestCacheConfig;
/// # use std::time::Duration;
/// let config = RequestCacheConfig::new().ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct RequestCacheConfig {
    /// Maximum number of memoized responses. Default: 100.
    pub max_entries: u64,
    /// Time-to-live for memoized responses. Default: 5 minutes.
    pub ttl: Duration,
}

impl Default for RequestCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl: Duration::from_secs(300),
        }
    }
}

impl RequestCacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of memoized responses.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for memoized responses.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Bounded TTL store for recent boundary responses.
///
/// Moka handles expiry and capacity internally, replacing the original's
/// manual read-time expiry checks and over-capacity housekeeping sweeps.
pub struct RequestCache {
    entries: Cache<String, Value>,
}

impl RequestCache {
    /// Create a cache from the given configuration.
    pub fn new(config: &RequestCacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { entries }
    }

    /// Look up a memoized response. `None` on miss or expiry.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).await
    }

    /// Memoize a response with a fresh expiry.
    pub async fn insert(&self, key: String, value: Value) {
        self.entries.insert(key, value).await;
    }
}
