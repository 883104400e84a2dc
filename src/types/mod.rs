//! Request types crossing the context boundary.
//!
//! Everything the privileged background process understands is expressed
//! as a [`DataRequest`] variant. On the wire a request is a tagged JSON
//! object — the `kind` field is the discriminator the remote dispatcher
//! switches on:
//!
//! ```json
//! { "kind": "fetch_strategy", "tag": "dynamic-programming" }
//! ```
//!
//! Responses come back either as raw data, as a `{ "data": … }` envelope,
//! or as `{ "status": "error", "error": … }`. Envelope unwrapping lives in
//! [`crate::transport`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed request for the privileged-process data handler.
///
/// Immutable once constructed. Serializes to a `kind`-tagged JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataRequest {
    /// Strategy notes for a single problem tag.
    FetchStrategy { tag: String },
    /// Strategy notes for several tags in one round trip.
    FetchStrategies { tags: Vec<String> },
    /// Contextual tips synthesized from the problem's tag set.
    FetchContextualHints {
        tags: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        difficulty: Option<String>,
    },
    /// User settings blob.
    GetSettings,
    /// Persist a settings blob.
    SaveSettings { settings: Value },
}

impl DataRequest {
    /// The wire discriminator for this request.
    ///
    /// Used to tag timeout and remote errors with the operation that
    /// produced them.
    pub fn kind(&self) -> &'static str {
        match self {
            DataRequest::FetchStrategy { .. } => "fetch_strategy",
            DataRequest::FetchStrategies { .. } => "fetch_strategies",
            DataRequest::FetchContextualHints { .. } => "fetch_contextual_hints",
            DataRequest::GetSettings => "get_settings",
            DataRequest::SaveSettings { .. } => "save_settings",
        }
    }
}
