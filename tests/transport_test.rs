//! Tests for [`Transport`] — timeout, retry/backoff, envelope unwrapping,
//! and the opt-in memoization layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use hintbridge::transport::{RequestCacheConfig, RetryPolicy, SendOptions, Transport};
use hintbridge::{BridgeError, DataRequest, MessageChannel, Result};

/// Channel that fails N times then succeeds with a data envelope.
struct FlakyChannel {
    fail_count: AtomicU32,
    total_calls: AtomicU32,
}

impl FlakyChannel {
    fn new(failures: u32) -> Self {
        Self {
            fail_count: AtomicU32::new(failures),
            total_calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageChannel for FlakyChannel {
    async fn request(&self, _payload: Value) -> Result<Value> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::Relaxed);
            return Err(BridgeError::Channel("port disconnected".into()));
        }
        Ok(json!({ "data": { "tips": ["two pointers"] } }))
    }
}

/// Channel that responds with a fixed value and counts calls.
struct FixedChannel {
    response: Value,
    total_calls: AtomicU32,
}

impl FixedChannel {
    fn new(response: Value) -> Self {
        Self {
            response,
            total_calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageChannel for FixedChannel {
    async fn request(&self, _payload: Value) -> Result<Value> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.response.clone())
    }
}

/// Channel that never responds — the remote handler dropped the request.
struct SilentChannel;

#[async_trait]
impl MessageChannel for SilentChannel {
    async fn request(&self, _payload: Value) -> Result<Value> {
        std::future::pending().await
    }
}

/// Always-failing channel that records when each attempt arrived.
struct RecordingChannel {
    attempt_times: std::sync::Mutex<Vec<tokio::time::Instant>>,
}

impl RecordingChannel {
    fn new() -> Self {
        Self {
            attempt_times: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn request(&self, _payload: Value) -> Result<Value> {
        self.attempt_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        Err(BridgeError::Channel("always failing".into()))
    }
}

fn strategy_request() -> DataRequest {
    DataRequest::FetchStrategy { tag: "array".into() }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new().initial_delay(Duration::from_millis(1))
}

// =========================================================================
// Envelope handling
// =========================================================================

#[tokio::test]
async fn unwraps_data_envelope_on_success() {
    let channel = Arc::new(FixedChannel::new(json!({ "data": [1, 2] })));
    let transport = Transport::new(channel);

    let data = transport
        .send(&strategy_request(), &SendOptions::new())
        .await
        .unwrap();

    assert_eq!(data, json!([1, 2]));
}

#[tokio::test]
async fn returns_raw_response_without_envelope() {
    let channel = Arc::new(FixedChannel::new(json!({ "tips": [] })));
    let transport = Transport::new(channel);

    let data = transport
        .send(&strategy_request(), &SendOptions::new())
        .await
        .unwrap();

    assert_eq!(data, json!({ "tips": [] }));
}

#[tokio::test]
async fn error_envelope_surfaces_as_remote_error() {
    let channel = Arc::new(FixedChannel::new(json!({
        "status": "error",
        "error": "store unavailable"
    })));
    let transport = Transport::new(channel.clone());

    let err = transport
        .send(&strategy_request(), &SendOptions::new().retries(0))
        .await
        .unwrap_err();

    match err {
        BridgeError::Remote { kind, message } => {
            assert_eq!(kind, "fetch_strategy");
            assert_eq!(message, "store unavailable");
        }
        other => panic!("expected Remote, got {other:?}"),
    }
    assert_eq!(channel.call_count(), 1);
}

#[tokio::test]
async fn error_envelope_is_retried() {
    let channel = Arc::new(FixedChannel::new(json!({
        "status": "error",
        "error": "busy"
    })));
    let transport = Transport::builder(channel.clone())
        .retry_policy(fast_retry())
        .build();

    let result = transport
        .send(&strategy_request(), &SendOptions::new().retries(2))
        .await;

    assert!(result.is_err());
    assert_eq!(channel.call_count(), 3);
}

// =========================================================================
// Timeout
// =========================================================================

#[tokio::test(start_paused = true)]
async fn silent_handler_manifests_as_timeout() {
    let transport = Transport::new(Arc::new(SilentChannel));

    let err = transport
        .send(
            &strategy_request(),
            &SendOptions::new()
                .timeout(Duration::from_millis(100))
                .retries(0),
        )
        .await
        .unwrap_err();

    match err {
        BridgeError::Timeout { kind, timeout_ms } => {
            assert_eq!(kind, "fetch_strategy");
            assert_eq!(timeout_ms, 100);
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
}

// =========================================================================
// Retry / backoff
// =========================================================================

#[tokio::test]
async fn retries_then_succeeds() {
    let channel = Arc::new(FlakyChannel::new(2));
    let transport = Transport::builder(channel.clone())
        .retry_policy(fast_retry())
        .build();

    let data = transport
        .send(&strategy_request(), &SendOptions::new().retries(3))
        .await
        .unwrap();

    assert_eq!(data, json!({ "tips": ["two pointers"] }));
    assert_eq!(channel.call_count(), 3); // 2 failures + 1 success
}

#[tokio::test]
async fn exhausted_budget_makes_exactly_retries_plus_one_attempts() {
    let channel = Arc::new(FlakyChannel::new(10));
    let transport = Transport::builder(channel.clone())
        .retry_policy(fast_retry())
        .build();

    let result = transport
        .send(&strategy_request(), &SendOptions::new().retries(2))
        .await;

    assert!(result.is_err());
    assert_eq!(channel.call_count(), 3);
}

#[tokio::test]
async fn last_error_surfaces_verbatim() {
    let channel = Arc::new(FlakyChannel::new(10));
    let transport = Transport::builder(channel)
        .retry_policy(fast_retry())
        .build();

    let err = transport
        .send(&strategy_request(), &SendOptions::new().retries(1))
        .await
        .unwrap_err();

    match err {
        BridgeError::Channel(message) => assert_eq!(message, "port disconnected"),
        other => panic!("expected Channel, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn backoff_delay_doubles_between_attempts() {
    let channel = Arc::new(RecordingChannel::new());
    let transport = Transport::builder(channel.clone())
        .retry_policy(RetryPolicy::new().initial_delay(Duration::from_millis(100)))
        .build();

    let _ = transport
        .send(&strategy_request(), &SendOptions::new().retries(2))
        .await;

    let times = channel.attempt_times.lock().unwrap();
    assert_eq!(times.len(), 3);
    let first_gap = times[1] - times[0];
    let second_gap = times[2] - times[1];
    // Paused clock: sleeps advance time exactly.
    assert_eq!(first_gap, Duration::from_millis(100));
    assert_eq!(second_gap, Duration::from_millis(200));
}

// =========================================================================
// Opt-in memoization layer
// =========================================================================

#[tokio::test]
async fn memoized_request_crosses_boundary_once() {
    let channel = Arc::new(FixedChannel::new(json!({ "data": "notes" })));
    let transport = Transport::builder(channel.clone())
        .request_cache(RequestCacheConfig::default())
        .build();
    let options = SendOptions::new().cache_key("strategy_array");

    let first = transport.send(&strategy_request(), &options).await.unwrap();
    let second = transport.send(&strategy_request(), &options).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(channel.call_count(), 1);
}

#[tokio::test]
async fn distinct_cache_keys_do_not_collide() {
    let channel = Arc::new(FixedChannel::new(json!({ "data": "notes" })));
    let transport = Transport::builder(channel.clone())
        .request_cache(RequestCacheConfig::default())
        .build();

    transport
        .send(
            &strategy_request(),
            &SendOptions::new().cache_key("strategy_array"),
        )
        .await
        .unwrap();
    transport
        .send(
            &DataRequest::FetchStrategy { tag: "tree".into() },
            &SendOptions::new().cache_key("strategy_tree"),
        )
        .await
        .unwrap();

    assert_eq!(channel.call_count(), 2);
}

#[tokio::test]
async fn memoization_expires_after_ttl() {
    let channel = Arc::new(FixedChannel::new(json!({ "data": "notes" })));
    let transport = Transport::builder(channel.clone())
        .request_cache(RequestCacheConfig::new().ttl(Duration::from_millis(50)))
        .build();
    let options = SendOptions::new().cache_key("strategy_array");

    transport.send(&strategy_request(), &options).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    transport.send(&strategy_request(), &options).await.unwrap();

    assert_eq!(channel.call_count(), 2);
}

#[tokio::test]
async fn cache_agnostic_without_layer() {
    // A cache key on the options is inert when no layer was configured.
    let channel = Arc::new(FixedChannel::new(json!({ "data": "notes" })));
    let transport = Transport::new(channel.clone());
    let options = SendOptions::new().cache_key("strategy_array");

    transport.send(&strategy_request(), &options).await.unwrap();
    transport.send(&strategy_request(), &options).await.unwrap();

    assert_eq!(channel.call_count(), 2);
}

#[test]
fn send_options_defaults() {
    let options = SendOptions::default();
    assert_eq!(options.timeout, Duration::from_secs(10));
    assert_eq!(options.retries, 3);
    assert!(options.cache_key.is_none());
}

#[test]
fn retry_policy_default_base_delay() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
}
