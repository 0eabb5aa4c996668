//! Content digest over a normalized (request, configuration) pair.
//!
//! The digest is the cache's staleness oracle: a stored entry may only
//! satisfy a lookup whose digest matches the one recorded when the entry
//! was computed. Caller-unique fields are stripped before hashing so that
//! semantically identical requests hash identically, and object keys are
//! serialized in sorted order so the digest is insensitive to field order.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Object keys that vary per caller without affecting the answer.
const CALLER_UNIQUE_KEYS: &[&str] = &["request_id", "requestId", "expire_time", "expireTime"];

/// Compute the digest for a request evaluated under the given configuration
/// text. Pure and deterministic.
pub fn request_config_digest(request: &Value, config_text: &str) -> String {
    let mut canonical = String::new();
    write_canonical(&mut canonical, request);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update([0u8]);
    hasher.update(config_text.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_caller_unique(key: &str) -> bool {
    CALLER_UNIQUE_KEYS.contains(&key)
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|key| !is_caller_unique(key.as_str()))
                .collect();
            keys.sort_unstable();

            out.push('{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_scalar(out, &Value::String((*key).clone()));
                out.push(':');
                write_canonical(out, &map[*key]);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => write_scalar(out, scalar),
    }
}

fn write_scalar(out: &mut String, value: &Value) {
    // Scalars serialize unambiguously; only objects need key ordering.
    match serde_json::to_string(value) {
        Ok(encoded) => out.push_str(&encoded),
        Err(_) => out.push_str("null"),
    }
}
