//! High-level lookup service composing the cache over the transport.
//!
//! [`HintService`] is the typical consumer wiring: a [`DataCache`] keyed by
//! deterministic operation keys, whose producers cross the boundary through
//! a shared [`Transport`]. Callers get cached data immediately when fresh;
//! a cold or expired key costs one deduplicated boundary round trip.
//!
//! Payloads stay as [`serde_json::Value`] — interpreting strategy notes and
//! hint tiers is the caller's concern, not the data layer's. A failed
//! lookup means "no data available right now"; degrade to fallback content
//! rather than treating it as fatal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::cache::{CacheConfig, CacheStats, DataCache, key};
use crate::transport::{SendOptions, Transport};
use crate::types::DataRequest;
use crate::Result;

/// Cached, deduplicated access to strategy and hint data.
pub struct HintService {
    transport: Arc<Transport>,
    cache: DataCache<Value>,
    options: SendOptions,
}

impl HintService {
    /// Create a service over the given transport.
    ///
    /// Lookups default to a short per-attempt deadline with one retry —
    /// these sit on latency-sensitive UI paths, and the cache absorbs the
    /// occasional failure via stale fallback.
    pub fn new(transport: Arc<Transport>, cache_config: CacheConfig) -> Self {
        Self {
            transport,
            cache: DataCache::new(cache_config),
            options: SendOptions::new()
                .timeout(Duration::from_millis(1_500))
                .retries(1),
        }
    }

    /// Override the per-lookup transport options.
    pub fn with_send_options(mut self, options: SendOptions) -> Self {
        self.options = options;
        self
    }

    /// Strategy notes for one problem tag.
    pub async fn strategy(&self, tag: &str) -> Result<Value> {
        let request = DataRequest::FetchStrategy {
            tag: tag.to_string(),
        };
        self.fetch_cached(&key::strategy_key(tag), request).await
    }

    /// Strategy notes for several tags in one round trip.
    pub async fn strategies(&self, tags: &[String]) -> Result<Value> {
        let request = DataRequest::FetchStrategies {
            tags: tags.to_vec(),
        };
        self.fetch_cached(&key::cache_key("strategies", tags), request)
            .await
    }

    /// Contextual tips for a problem's tag set.
    pub async fn contextual_hints(&self, tags: &[String], difficulty: Option<&str>) -> Result<Value> {
        let mut params = tags.to_vec();
        if let Some(difficulty) = difficulty {
            params.push(format!("difficulty={difficulty}"));
        }
        let request = DataRequest::FetchContextualHints {
            tags: tags.to_vec(),
            difficulty: difficulty.map(str::to_string),
        };
        self.fetch_cached(&key::cache_key("contextual_hints", &params), request)
            .await
    }

    /// The user settings blob.
    pub async fn settings(&self) -> Result<Value> {
        self.fetch_cached(&key::settings_key(), DataRequest::GetSettings)
            .await
    }

    /// Persist a settings blob and drop the cached copy.
    pub async fn save_settings(&self, settings: Value) -> Result<Value> {
        let saved = self
            .transport
            .send(&DataRequest::SaveSettings { settings }, &self.options)
            .await?;
        self.cache.invalidate(&key::settings_key()).await;
        Ok(saved)
    }

    /// Drop every cached strategy entry (e.g. after upstream data changed).
    pub async fn invalidate_strategies(&self) -> usize {
        self.cache.invalidate("strategy_").await
    }

    /// Warm the cache for tags the user is about to need.
    pub async fn preload_strategies(&self, tags: &[String]) {
        let keys: Vec<String> = tags.iter().map(|tag| key::strategy_key(tag)).collect();
        let transport = Arc::clone(&self.transport);
        let options = self.options.clone();
        self.cache
            .preload(&keys, move |key| {
                let tag = key
                    .strip_prefix("strategy_")
                    .unwrap_or(key.as_str())
                    .to_string();
                let transport = Arc::clone(&transport);
                let options = options.clone();
                async move {
                    transport
                        .send(&DataRequest::FetchStrategy { tag }, &options)
                        .await
                }
            })
            .await;
    }

    /// Snapshot of the underlying cache counters.
    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Stop the cache's background sweeper.
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    fn producer(&self, request: DataRequest) -> impl Future<Output = Result<Value>> + Send + 'static {
        let transport = Arc::clone(&self.transport);
        let options = self.options.clone();
        async move { transport.send(&request, &options).await }
    }

    async fn fetch_cached(&self, key: &str, request: DataRequest) -> Result<Value> {
        self.cache.get_or_fetch(key, || self.producer(request)).await
    }
}
