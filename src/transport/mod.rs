//! Cross-context transport with bounded latency and bounded retry effort.
//!
//! [`Transport`] moves one [`DataRequest`](crate::DataRequest) across the
//! privileged-process boundary and back. Each attempt races the underlying
//! channel call against a deadline; failed attempts are retried with
//! exponential backoff up to the configured budget. Responses for requests
//! that opted in can be memoized for a short time in an optional
//! [`RequestCache`] layer.
//!
//! # Channel abstraction
//!
//! The actual messaging primitive is behind the [`MessageChannel`] trait:
//! production wires in the extension's runtime port, tests wire in mocks.
//! The contract is one response per request — a handler that never responds
//! manifests purely as a local timeout.
//!
//! # Timeouts are races
//!
//! `tokio::time::timeout` drops the in-flight channel future when the
//! deadline fires. A remote side that eventually answers is simply never
//! observed; no abort signal crosses the boundary.

mod cache;

pub use cache::{RequestCache, RequestCacheConfig};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::telemetry;
use crate::types::DataRequest;
use crate::{BridgeError, Result};

/// Abstraction over the cross-context messaging primitive.
///
/// Implementations send one JSON payload to the privileged process and
/// resolve with its response. Transport-level faults (disconnected port,
/// serialization failure in the runtime) surface as [`BridgeError::Channel`].
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Send a payload across the boundary and await the single response.
    async fn request(&self, payload: Value) -> Result<Value>;
}

/// Retry behaviour for transport attempts.
///
/// Exponential backoff: `initial_delay * 2^attempt`, deliberately uncapped —
/// total effort is bounded by the attempt budget, not by a delay ceiling.
///
/// ```rust
/// # use hintbridge::transport::RetryPolicy;
/// # use std::time::Duration;
/// let policy = RetryPolicy::new().initial_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default base delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay before the retry following attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Per-call options for [`Transport::send`].
///
/// ```rust
/// # use hintbridge::transport::SendOptions;
/// # use std::time::Duration;
/// // Latency-sensitive lookup: short deadline, one retry, memoized.
/// let options = SendOptions::new()
///     .timeout(Duration::from_millis(1_500))
///     .retries(1)
///     .cache_key("strategy_array");
/// ```
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Per-attempt deadline. Default: 10s.
    pub timeout: Duration,
    /// Additional attempts after the first. Default: 3.
    pub retries: u32,
    /// Opt-in short-term memoization key. Only effective when the
    /// transport was built with a [`RequestCache`] layer.
    pub cache_key: Option<String>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            cache_key: None,
        }
    }
}

impl SendOptions {
    /// Create options with default deadline and retry budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-attempt deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of additional attempts after the first.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Mark the request memoizable under the given key.
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }
}

/// Builder for [`Transport`].
pub struct TransportBuilder {
    channel: Arc<dyn MessageChannel>,
    retry: RetryPolicy,
    request_cache: Option<RequestCacheConfig>,
}

impl TransportBuilder {
    /// Configure the backoff policy for failed attempts.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Enable the short-term response memoization layer.
    ///
    /// Without this, the transport is cache-agnostic and every send
    /// crosses the boundary. Enable it when a "never make two identical
    /// cross-context calls within the TTL" guard is wanted below the
    /// orchestrator, e.g. across orchestrator invalidations.
    pub fn request_cache(mut self, config: RequestCacheConfig) -> Self {
        self.request_cache = Some(config);
        self
    }

    /// Build the transport.
    pub fn build(self) -> Transport {
        Transport {
            channel: self.channel,
            retry: self.retry,
            cache: self.request_cache.map(|config| RequestCache::new(&config)),
        }
    }
}

/// Resilient sender for cross-context data requests.
///
/// Owns its channel handle and (optionally) a private memoization store,
/// separate from any orchestrator-level cache layered above it.
pub struct Transport {
    channel: Arc<dyn MessageChannel>,
    retry: RetryPolicy,
    cache: Option<RequestCache>,
}

impl Transport {
    /// Start building a transport over the given channel.
    pub fn builder(channel: Arc<dyn MessageChannel>) -> TransportBuilder {
        TransportBuilder {
            channel,
            retry: RetryPolicy::default(),
            request_cache: None,
        }
    }

    /// Create a transport with default policy and no memoization layer.
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self::builder(channel).build()
    }

    /// Send a request across the boundary, with retries and backoff.
    ///
    /// Attempts `options.retries + 1` calls in total. Timeouts, channel
    /// faults and remote error envelopes all count as failed attempts;
    /// after the budget is exhausted the last error surfaces verbatim.
    /// On success the envelope's `data` field is unwrapped (or the raw
    /// response returned when no envelope is present).
    pub async fn send(&self, request: &DataRequest, options: &SendOptions) -> Result<Value> {
        let kind = request.kind();

        if let (Some(cache), Some(key)) = (&self.cache, &options.cache_key) {
            if let Some(hit) = cache.get(key).await {
                debug!(kind, key = %key, "transport cache hit, skipping boundary call");
                metrics::counter!(telemetry::TRANSPORT_CACHE_HITS_TOTAL).increment(1);
                return Ok(hit);
            }
        }

        let payload = serde_json::to_value(request)?;
        let started = std::time::Instant::now();
        let attempts = options.retries + 1;
        let mut last_err = None;

        for attempt in 0..attempts {
            match self.attempt(kind, payload.clone(), options.timeout).await {
                Ok(data) => {
                    if let (Some(cache), Some(key)) = (&self.cache, &options.cache_key) {
                        cache.insert(key.clone(), data.clone()).await;
                    }
                    metrics::counter!(telemetry::REQUESTS_TOTAL,
                        "kind" => kind, "status" => "ok")
                    .increment(1);
                    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "kind" => kind)
                        .record(started.elapsed().as_secs_f64());
                    return Ok(data);
                }
                Err(e) => {
                    if attempt + 1 < attempts {
                        let delay = self.retry.delay_for_attempt(attempt);
                        metrics::counter!(telemetry::RETRIES_TOTAL, "kind" => kind).increment(1);
                        warn!(
                            kind,
                            attempt = attempt + 1,
                            attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying after failed attempt"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_err = Some(e);
                }
            }
        }

        metrics::counter!(telemetry::REQUESTS_TOTAL, "kind" => kind, "status" => "error")
            .increment(1);
        Err(last_err.unwrap_or_else(|| BridgeError::Channel("no attempts made".into())))
    }

    /// One boundary crossing, raced against the deadline.
    async fn attempt(&self, kind: &str, payload: Value, deadline: Duration) -> Result<Value> {
        let response = tokio::time::timeout(deadline, self.channel.request(payload))
            .await
            .map_err(|_| BridgeError::Timeout {
                kind: kind.to_string(),
                timeout_ms: deadline.as_millis() as u64,
            })??;
        unwrap_envelope(response, kind)
    }
}

/// Unwrap the response envelope.
///
/// Inbound is either raw data, `{ "data": … }`, or
/// `{ "status": "error", "error": … }`.
fn unwrap_envelope(response: Value, kind: &str) -> Result<Value> {
    if let Value::Object(map) = &response {
        if map.get("status").and_then(Value::as_str) == Some("error") {
            let message = match map.get("error") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "unspecified remote error".to_string(),
            };
            return Err(BridgeError::Remote {
                kind: kind.to_string(),
                message,
            });
        }
        if let Some(data) = map.get("data") {
            return Ok(data.clone());
        }
    }
    Ok(response)
}
