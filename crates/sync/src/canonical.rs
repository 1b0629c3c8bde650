// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Signature canonicalization (§9 open question, resolved): minified JSON
//! with keys sorted lexicographically at every nesting level, the
//! `signature` field omitted, encoded as UTF-8 and signed with Ed25519.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Recursively sorts object keys and drops any `signature` field, at any
/// depth, so a signer and a verifier always hash the same bytes regardless
/// of field insertion order on either side.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: BTreeMap<&str, Value> = BTreeMap::new();
            for (key, v) in map {
                if key == "signature" {
                    continue;
                }
                sorted.insert(key.as_str(), canonicalize(v));
            }
            let mut out = serde_json::Map::new();
            for (key, v) in sorted {
                out.insert(key.to_string(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// The exact byte string an Ed25519 signature is computed (and verified)
/// over for `value`.
pub fn canonical_bytes<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let raw = serde_json::to_value(value)?;
    serde_json::to_vec(&canonicalize(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_canonical_bytes() {
        let a = json!({"b": 1, "a": 2, "signature": "drop-me"});
        let b = json!({"signature": "drop-me-too", "a": 2, "b": 1});
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn nested_objects_are_sorted_too() {
        let value = json!({"outer": {"z": 1, "a": 2}});
        let bytes = canonical_bytes(&value).unwrap();
        let as_str = String::from_utf8(bytes).unwrap();
        assert_eq!(as_str, r#"{"outer":{"a":2,"z":1}}"#);
    }
}
