//! Hintbridge error types

/// Hintbridge error types
///
/// Every variant is `Clone`: a deduplicated in-flight fetch settles once
/// and its result is fanned out to every caller that awaited it, so the
/// error value must be cloneable alongside the data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// No response within the per-attempt deadline. Tagged with the
    /// request kind so callers can tell *which* lookup stalled.
    #[error("request '{kind}' timed out after {timeout_ms}ms")]
    Timeout { kind: String, timeout_ms: u64 },

    /// The cross-context messaging primitive itself faulted.
    #[error("channel error: {0}")]
    Channel(String),

    /// The remote handler responded with an explicit error envelope.
    #[error("remote error for '{kind}': {message}")]
    Remote { kind: String, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    /// A cache producer failed with something other than a [`BridgeError`].
    #[error("producer error: {0}")]
    Producer(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        // serde_json::Error is not Clone; keep the message only.
        BridgeError::Json(err.to_string())
    }
}

/// Result type alias for hintbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
