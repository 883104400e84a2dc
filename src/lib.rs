//! Hintbridge - resilient cross-context data access for learning companions
//!
//! This crate moves strategy and hint data across a browser extension's
//! privileged-process boundary with bounded latency and graceful
//! degradation. Two components compose into the core:
//!
//! - [`Transport`] — sends a typed [`DataRequest`] across the boundary,
//!   racing each attempt against a deadline and retrying with exponential
//!   backoff, with opt-in short-term response memoization.
//! - [`DataCache`] — a get-or-compute LRU + TTL cache over arbitrary async
//!   producers, with in-flight request deduplication and stale-on-error
//!   fallback.
//!
//! [`HintService`] wires the two together for the common lookups.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use hintbridge::{HintService, MessageChannel, Transport};
//! use hintbridge::cache::CacheConfig;
//! use serde_json::Value;
//!
//! /// Channel backed by the extension's runtime port.
//! struct RuntimePort;
//!
//! #[async_trait]
//! impl MessageChannel for RuntimePort {
//!     async fn request(&self, payload: Value) -> hintbridge::Result<Value> {
//!         // hand `payload` to the messaging runtime, await its response
//!         # unimplemented!()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> hintbridge::Result<()> {
//!     let transport = Arc::new(Transport::new(Arc::new(RuntimePort)));
//!     let hints = HintService::new(transport, CacheConfig::default());
//!
//!     // First call crosses the boundary; repeats within the TTL are
//!     // served from cache, and concurrent identical lookups share one
//!     // boundary round trip.
//!     let strategy = hints.strategy("dynamic-programming").await?;
//!     println!("{strategy}");
//!     Ok(())
//! }
//! ```
//!
//! # Failure behaviour
//!
//! A fetch that fails after a key has ever resolved returns the previous
//! value, even past its TTL. Only a genuinely cold key surfaces the error.
//! Treat errors as "no data available right now" and degrade the UI, not
//! as fatal conditions.

pub mod cache;
pub mod error;
pub mod service;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheStats, DataCache};
pub use error::{BridgeError, Result};
pub use service::HintService;
pub use transport::{MessageChannel, RetryPolicy, SendOptions, Transport};
pub use types::DataRequest;
