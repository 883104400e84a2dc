//! Get-or-compute cache with deduplication and graceful degradation.
//!
//! [`DataCache`] gives callers a uniform get-or-compute operation over
//! arbitrary async producers, with LRU + TTL bounding, concurrency-safe
//! request deduplication, and stale-on-error fallback.
//!
//! # Architecture
//!
//! One [`tokio::sync::Mutex`] guards the entry store, the in-flight
//! registry and the metrics counters; the lock is never held across an
//! await point, so interleaved callers serialize only on bookkeeping.
//! A cold key registers a single [`Shared`] fetch future that every
//! concurrent caller for that key awaits — at most one producer runs per
//! key at any time. The registration is removed the moment the fetch
//! settles, success or failure.
//!
//! # Degradation
//!
//! A failed producer is absorbed when the key has ever resolved before:
//! the previous entry's data is returned even past its TTL. Only a
//! genuinely cold key propagates the producer's error. This trades
//! freshness for availability — a momentary boundary failure degrades to
//! a slightly stale answer instead of a visible error.
//!
//! # Lifecycle
//!
//! The cache is an explicitly constructed instance; construct it during
//! application startup and inject it into consumers. An owned background
//! task sweeps expired entries (default every 2 minutes) and is stopped
//! by [`DataCache::shutdown`] or when the cache is dropped.

pub mod key;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, join_all};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::telemetry;
use crate::{BridgeError, Result};

/// Fixed per-entry bookkeeping overhead used in the memory estimate.
const ENTRY_OVERHEAD_BYTES: usize = 80;

/// Configuration for [`DataCache`].
///
/// ```rust
/// # use hintbridge::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(200)
///     .ttl(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction. Default: 100.
    pub max_entries: usize,
    /// Freshness lifetime; a read at or past this age refetches. Default: 5 minutes.
    pub ttl: Duration,
    /// Interval between background expiry sweeps. Default: 2 minutes.
    pub sweep_interval: Duration,
    /// Deadline wrapped around every producer invocation. Default: 5s.
    pub fetch_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(120),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the freshness TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the background sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the producer deadline.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Point-in-time snapshot of cache performance counters.
///
/// Shape is stable for external dashboards; see [`DataCache::stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// `hits / total_requests`, `0.0` before any request.
    pub hit_rate: f64,
    /// Entries currently stored (fresh and stale).
    pub size: usize,
    /// Configured capacity.
    pub max_size: usize,
    /// Outstanding deduplicated fetches.
    pub in_flight: usize,
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    /// Running average producer latency over successful fetches.
    pub avg_fetch_latency_ms: f64,
    /// Serialized key + value sizes plus fixed per-entry overhead.
    pub memory_estimate_bytes: usize,
}

struct CacheEntry<V> {
    data: V,
    inserted: Instant,
    last_accessed: Instant,
    access_count: u64,
    size_bytes: usize,
}

impl<V> CacheEntry<V> {
    fn new(data: V, size_bytes: usize) -> Self {
        let now = Instant::now();
        Self {
            data,
            inserted: now,
            last_accessed: now,
            access_count: 1,
            size_bytes,
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    total_requests: u64,
    completed_fetches: u64,
    avg_fetch_latency_ms: f64,
    memory_bytes: usize,
}

impl Counters {
    /// Incremental running average, no sample history kept.
    fn record_fetch_latency(&mut self, latency: Duration) {
        self.completed_fetches += 1;
        let sample = latency.as_secs_f64() * 1_000.0;
        self.avg_fetch_latency_ms +=
            (sample - self.avg_fetch_latency_ms) / self.completed_fetches as f64;
    }
}

type InFlightFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    in_flight: HashMap<String, InFlightFetch<V>>,
    counters: Counters,
}

impl<V> CacheInner<V> {
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.counters.memory_bytes = self.counters.memory_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }
}

/// LRU + TTL cache over arbitrary async producers.
///
/// Generic over the cached value type; consumers working against the
/// boundary typically use `DataCache<serde_json::Value>`.
pub struct DataCache<V> {
    inner: Arc<Mutex<CacheInner<V>>>,
    config: CacheConfig,
    sweeper: JoinHandle<()>,
}

impl<V> DataCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    /// Create a cache and start its expiry sweeper.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context (the sweeper task is spawned here).
    pub fn new(config: CacheConfig) -> Self {
        let inner = Arc::new(Mutex::new(CacheInner {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            counters: Counters::default(),
        }));
        let sweeper = spawn_sweeper(Arc::clone(&inner), config.ttl, config.sweep_interval);
        Self {
            inner,
            config,
            sweeper,
        }
    }

    /// Get-or-compute with the configured default producer deadline.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, producer: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.get_or_fetch_with_timeout(key, producer, self.config.fetch_timeout)
            .await
    }

    /// Get-or-compute with an explicit producer deadline.
    ///
    /// Fresh hit: returns the stored value without invoking `producer`.
    /// Outstanding fetch for the same key: awaits it alongside the caller
    /// that started it. Cold or expired key: invokes `producer` (wrapped in
    /// `timeout`), stores the result wholesale, and fans it out. On producer
    /// failure the previous value — even expired — is served when one
    /// exists; otherwise the error propagates.
    pub async fn get_or_fetch_with_timeout<F, Fut>(
        &self,
        key: &str,
        producer: F,
        timeout: Duration,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let fetch = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            inner.counters.total_requests += 1;

            if let Some(entry) = inner.entries.get_mut(key)
                && entry.inserted.elapsed() < self.config.ttl
            {
                entry.touch();
                inner.counters.hits += 1;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                return Ok(entry.data.clone());
            }

            if let Some(existing) = inner.in_flight.get(key) {
                existing.clone()
            } else {
                inner.counters.misses += 1;
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                let fetch = self.drive_fetch(key.to_string(), producer(), timeout);
                inner.in_flight.insert(key.to_string(), fetch.clone());
                fetch
            }
        };
        fetch.await
    }

    /// Build the single shared future that settles a cold key.
    ///
    /// Owns the store mutation: removes its in-flight registration when it
    /// settles, inserts the fresh entry (evicting first when at capacity),
    /// and falls back to a stale entry on failure.
    fn drive_fetch<Fut>(&self, key: String, fut: Fut, timeout: Duration) -> InFlightFetch<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let max_entries = self.config.max_entries;
        let task = async move {
            let started = Instant::now();
            let result = match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(BridgeError::Timeout {
                    kind: key.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };

            let mut guard = inner.lock().await;
            let inner = &mut *guard;
            inner.in_flight.remove(&key);

            match result {
                Ok(data) => {
                    inner.counters.record_fetch_latency(started.elapsed());
                    if !inner.entries.contains_key(&key) && inner.entries.len() >= max_entries {
                        evict_lru(inner, max_entries);
                    }
                    let size_bytes = estimate_entry_size(&key, &data);
                    // Wholesale replacement: a stale entry is never
                    // refreshed in place.
                    inner.remove_entry(&key);
                    inner
                        .entries
                        .insert(key, CacheEntry::new(data.clone(), size_bytes));
                    inner.counters.memory_bytes += size_bytes;
                    Ok(data)
                }
                Err(e) => {
                    if let Some(entry) = inner.entries.get_mut(&key) {
                        warn!(key = %key, error = %e, "fetch failed, serving stale entry");
                        metrics::counter!(telemetry::CACHE_STALE_SERVED_TOTAL).increment(1);
                        entry.touch();
                        Ok(entry.data.clone())
                    } else {
                        Err(e)
                    }
                }
            }
        };
        task.boxed().shared()
    }

    /// Remove every entry and in-flight registration whose key contains
    /// `pattern`. Returns the number of entries removed.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let matching: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();
        for key in &matching {
            inner.remove_entry(key);
        }
        inner.in_flight.retain(|key, _| !key.contains(pattern));
        debug!(pattern, removed = matching.len(), "invalidated cache entries");
        matching.len()
    }

    /// Warm the cache for every key that is not already live.
    ///
    /// Each key's fetch failure is isolated — logged and skipped — so one
    /// bad key never fails the batch. The whole batch is awaited.
    pub async fn preload<F, Fut>(&self, keys: &[String], producer: F)
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let pending: Vec<String> = {
            let guard = self.inner.lock().await;
            keys.iter()
                .filter(|key| {
                    guard
                        .entries
                        .get(key.as_str())
                        .is_none_or(|entry| entry.inserted.elapsed() >= self.config.ttl)
                })
                .cloned()
                .collect()
        };

        let producer = &producer;
        let fetches = pending.into_iter().map(|key| async move {
            let result = self.get_or_fetch(&key, || producer(key.clone())).await;
            if let Err(e) = result {
                warn!(key = %key, error = %e, "preload fetch failed");
            }
        });
        join_all(fetches).await;
    }

    /// Drop all entries and in-flight registrations and reset counters.
    ///
    /// The only operation that resets metrics.
    pub async fn clear(&self) {
        let mut guard = self.inner.lock().await;
        guard.entries.clear();
        guard.in_flight.clear();
        guard.counters = Counters::default();
    }

    /// Whether a live (non-expired) entry exists for `key`.
    pub async fn contains_live(&self, key: &str) -> bool {
        let guard = self.inner.lock().await;
        guard
            .entries
            .get(key)
            .is_some_and(|entry| entry.inserted.elapsed() < self.config.ttl)
    }

    /// Snapshot the performance counters.
    pub async fn stats(&self) -> CacheStats {
        let guard = self.inner.lock().await;
        let counters = &guard.counters;
        let hit_rate = if counters.total_requests == 0 {
            0.0
        } else {
            counters.hits as f64 / counters.total_requests as f64
        };
        CacheStats {
            hit_rate,
            size: guard.entries.len(),
            max_size: self.config.max_entries,
            in_flight: guard.in_flight.len(),
            total_requests: counters.total_requests,
            hits: counters.hits,
            misses: counters.misses,
            avg_fetch_latency_ms: counters.avg_fetch_latency_ms,
            memory_estimate_bytes: counters.memory_bytes,
        }
    }

    /// Stop the background sweeper.
    ///
    /// Also happens on drop; exposed for explicit teardown sequencing.
    pub fn shutdown(&self) {
        self.sweeper.abort();
    }
}

impl<V> Drop for DataCache<V> {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

/// Remove the oldest-by-access 10% (minimum 1) to make room at capacity.
///
/// Approximate LRU: ordering is exact within the removed sample, not
/// maintained globally between insertions.
fn evict_lru<V>(inner: &mut CacheInner<V>, max_entries: usize) {
    let count = (max_entries / 10).max(1);
    let mut by_access: Vec<(String, Instant)> = inner
        .entries
        .iter()
        .map(|(key, entry)| (key.clone(), entry.last_accessed))
        .collect();
    by_access.sort_by_key(|(_, accessed)| *accessed);
    let mut removed = 0u64;
    for (key, _) in by_access.into_iter().take(count) {
        if inner.remove_entry(&key).is_some() {
            removed += 1;
        }
    }
    metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(removed);
}

/// Serialized key + value size plus fixed overhead.
///
/// Values that fail to serialize contribute only the overhead — the
/// estimate is best-effort, never an error source.
fn estimate_entry_size<V: Serialize>(key: &str, data: &V) -> usize {
    let value_len = serde_json::to_vec(data).map(|bytes| bytes.len()).unwrap_or(0);
    key.len() + value_len + ENTRY_OVERHEAD_BYTES
}

/// Owned expiry sweep task; aborted on shutdown/drop.
///
/// Bounds memory for keys that expired but are never re-requested, which
/// read-time checks alone would keep forever.
fn spawn_sweeper<V: Send + Sync + 'static>(
    inner: Arc<Mutex<CacheInner<V>>>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            let mut guard = inner.lock().await;
            let inner = &mut *guard;
            let expired: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.inserted.elapsed() >= ttl)
                .map(|(key, _)| key.clone())
                .collect();
            for key in &expired {
                inner.remove_entry(key);
            }
            if !expired.is_empty() {
                debug!(removed = expired.len(), "expiry sweep removed entries");
            }
        }
    })
}
