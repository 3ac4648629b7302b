use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of a request body, used to detect idempotency-key reuse with a
/// different payload.
///
/// Object keys are sorted before hashing, so two bodies that differ only in
/// key order produce the same fingerprint.
pub fn request_fingerprint<T: Serialize>(request: &T) -> String {
    let canonical = serde_json::to_value(request)
        .map(|v| canonicalize(v).to_string())
        .unwrap_or_default();
    sha256_hex(canonical.as_bytes())
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Normalize a client-supplied content hash (trim, lowercase, drop `sha256:` prefix).
pub fn normalize_content_hash(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    trimmed
        .strip_prefix("sha256:")
        .map(str::to_string)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a = json!({"amount": "10.00", "currency": "USD"});
        let b: serde_json::Value =
            serde_json::from_str(r#"{"currency":"USD","amount":"10.00"}"#).unwrap();
        assert_eq!(request_fingerprint(&a), request_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_detects_changes() {
        let a = json!({"amount": "10.00"});
        let b = json!({"amount": "10.01"});
        assert_ne!(request_fingerprint(&a), request_fingerprint(&b));
    }

    #[test]
    fn test_normalize_content_hash() {
        assert_eq!(normalize_content_hash(" SHA256:ABCD "), "abcd");
        assert_eq!(normalize_content_hash("abcd"), "abcd");
    }
}
