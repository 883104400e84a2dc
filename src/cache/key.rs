//! Deterministic cache key construction.
//!
//! Keys join an operation name with its sorted, stringified parameters so
//! that semantically identical requests collide on the same key regardless
//! of argument ordering. The cache performs no normalization itself —
//! callers build keys through these helpers.
//!
//! Keys are plain strings on purpose: [`DataCache::invalidate`](crate::DataCache::invalidate)
//! matches by substring, so a hashed key space would make pattern-based
//! invalidation impossible.

/// Build a key from an operation name and its parameters.
///
/// Parameters are sorted before joining: `("contextual_hints", ["tree",
/// "array"])` and `("contextual_hints", ["array", "tree"])` both yield
/// `"contextual_hints:array,tree"`.
pub fn cache_key<S: AsRef<str>>(operation: &str, params: &[S]) -> String {
    if params.is_empty() {
        return operation.to_string();
    }
    let mut sorted: Vec<&str> = params.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    format!("{operation}:{}", sorted.join(","))
}

/// Key for a single-tag strategy lookup, e.g. `"strategy_array"`.
pub fn strategy_key(tag: &str) -> String {
    format!("strategy_{tag}")
}

/// Key for the user settings blob.
pub fn settings_key() -> String {
    "settings".to_string()
}
