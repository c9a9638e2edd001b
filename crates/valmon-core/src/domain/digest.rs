//! Canonical JSON and SHA-256 digests over derived session views.
//!
//! Two engines fed the same event sequence with the same id generator must
//! produce byte-identical canonical views; the digest is the replay check.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Recursively sort object keys so the encoding does not depend on map
/// iteration order or on serde_json's `preserve_order` feature.
fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut sorted = serde_json::Map::new();
            for (key, v) in entries {
                sorted.insert(key, sort_keys(v));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

/// Serialize to compact JSON with sorted keys.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&sort_keys(value))
}

/// SHA-256 hex digest of the canonical JSON encoding.
pub fn compute_digest<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
