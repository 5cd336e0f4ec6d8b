//! Cache key derivation.

use sha2::{Digest, Sha256};

/// Serializes a JSON value with object keys sorted at every depth.
///
/// Logically equal inputs always produce the same string, whatever order
/// their object keys were inserted in.
#[must_use]
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Builds the cache key for an operation invocation.
///
/// Format: `<operation>:<first 16 bytes of sha256(canonical params), hex>`.
#[must_use]
pub fn cache_key(operation: &str, params: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(params).as_bytes());
    let digest = hasher.finalize();
    format!("{operation}:{}", hex::encode(&digest[..16]))
}
