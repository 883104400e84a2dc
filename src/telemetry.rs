//! Telemetry metric name constants.
//!
//! Centralised metric names for hintbridge operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `hintbridge_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `kind` — request kind crossing the context boundary (e.g. "fetch_strategy")
//! - `status` — outcome: "ok" or "error"

/// Total requests sent across the context boundary (attempts are not
/// counted separately; see [`RETRIES_TOTAL`]).
///
/// Labels: `kind`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "hintbridge_requests_total";

/// Request duration in seconds, measured across all attempts.
///
/// Labels: `kind`.
pub const REQUEST_DURATION_SECONDS: &str = "hintbridge_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `kind`.
pub const RETRIES_TOTAL: &str = "hintbridge_retries_total";

/// Total orchestrator cache hits.
pub const CACHE_HITS_TOTAL: &str = "hintbridge_cache_hits_total";

/// Total orchestrator cache misses (producer invocations).
pub const CACHE_MISSES_TOTAL: &str = "hintbridge_cache_misses_total";

/// Total stale entries served in place of a failed fresh fetch.
pub const CACHE_STALE_SERVED_TOTAL: &str = "hintbridge_cache_stale_served_total";

/// Total entries evicted to make room at capacity.
pub const CACHE_EVICTIONS_TOTAL: &str = "hintbridge_cache_evictions_total";

/// Total transport-level memoization hits (request cache layer).
pub const TRANSPORT_CACHE_HITS_TOTAL: &str = "hintbridge_transport_cache_hits_total";
