use anyhow::{Context, Result};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CacheError;

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// JCS sorts object keys and fixes number formatting, so two values that are
/// equal as JSON always produce identical bytes regardless of field order.
///
/// # Example
///
/// ```rust
/// use itinera_utils::canonicalization::emit_jcs;
/// use serde_json::json;
///
/// let a = emit_jcs(&json!({"days": 3, "city": "Chengdu"})).unwrap();
/// let b = emit_jcs(&json!({"city": "Chengdu", "days": 3})).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

/// Version tag mixed into every cache digest. Bumping it orphans old entries.
pub const CACHE_KEY_VERSION: &str = "itinera-cache-v1";
pub const CANONICALIZATION_BACKEND: &str = "jcs-rfc8785";

/// Content-addressed key for a cached result.
///
/// The digest is BLAKE3 over the key version, the request kind and the JCS
/// form of the request parameters. The kind namespaces unrelated request
/// types so an itinerary and an intent lookup can never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    kind: String,
    digest: String,
}

impl CacheKey {
    /// Compute the key for `params` under the request `kind`.
    ///
    /// `kind` must be non-empty and use only `[a-z0-9_-]`; it becomes a
    /// directory name in the cache.
    pub fn compute<T: Serialize>(kind: &str, params: &T) -> Result<Self, CacheError> {
        validate_kind(kind)?;

        let canonical =
            emit_jcs(params).map_err(|e| CacheError::Canonicalization(format!("{e:#}")))?;

        let mut hasher = Hasher::new();
        hasher.update(CACHE_KEY_VERSION.as_bytes());
        hasher.update(b"\n");
        hasher.update(kind.as_bytes());
        hasher.update(b"\n");
        hasher.update(canonical.as_bytes());

        Ok(Self {
            kind: kind.to_string(),
            digest: hasher.finalize().to_hex().to_string(),
        })
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Hex-encoded BLAKE3 digest (64 characters).
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.digest)
    }
}

fn validate_kind(kind: &str) -> Result<(), CacheError> {
    let valid = !kind.is_empty()
        && kind
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidKind {
            kind: kind.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_emit_jcs_sorts_keys() {
        let out = emit_jcs(&json!({"b": 1, "a": {"d": true, "c": null}})).unwrap();
        assert_eq!(out, r#"{"a":{"c":null,"d":true},"b":1}"#);
    }

    #[test]
    fn test_cache_key_shape() {
        let key = CacheKey::compute("itinerary", &json!({"city": "Xi'an", "days": 2})).unwrap();
        assert_eq!(key.kind(), "itinerary");
        assert_eq!(key.digest().len(), 64);
        assert!(key.digest().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key.to_string(), format!("itinerary/{}", key.digest()));
    }

    #[test]
    fn test_cache_key_distinguishes_parameters() {
        let a = CacheKey::compute("itinerary", &json!({"city": "Chengdu", "days": 3})).unwrap();
        let b = CacheKey::compute("itinerary", &json!({"city": "Chengdu", "days": 4})).unwrap();
        let c = CacheKey::compute("itinerary", &json!({"city": "Chongqing", "days": 3})).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cache_key_namespaced_by_kind() {
        let params = json!({"city": "Chengdu", "days": 3});
        let a = CacheKey::compute("itinerary", &params).unwrap();
        let b = CacheKey::compute("intent", &params).unwrap();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_invalid_kinds_rejected() {
        for kind in ["", "Itinerary", "../escape", "a b", "kind/x"] {
            assert!(
                matches!(
                    CacheKey::compute(kind, &json!({})),
                    Err(CacheError::InvalidKind { .. })
                ),
                "kind {kind:?} should be rejected"
            );
        }
    }

    #[derive(Serialize)]
    struct Forward {
        city: String,
        days: u32,
    }

    #[derive(Serialize)]
    struct Reversed {
        days: u32,
        city: String,
    }

    #[test]
    fn test_struct_field_order_irrelevant() {
        let a = CacheKey::compute(
            "itinerary",
            &Forward {
                city: "Lhasa".into(),
                days: 5,
            },
        )
        .unwrap();
        let b = CacheKey::compute(
            "itinerary",
            &Reversed {
                days: 5,
                city: "Lhasa".into(),
            },
        )
        .unwrap();
        assert_eq!(a, b);
    }

    /// Serializes its entries as a JSON object in the given order.
    struct OrderedParams(Vec<(String, i64)>);

    impl Serialize for OrderedParams {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use serde::ser::SerializeMap;
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for (k, v) in &self.0 {
                map.serialize_entry(k, v)?;
            }
            map.end()
        }
    }

    proptest! {
        #[test]
        fn prop_key_independent_of_emission_order(
            entries in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 2..12)
        ) {
            let forward = OrderedParams(entries.iter().map(|(k, v)| (k.clone(), *v)).collect());
            let reverse = OrderedParams(entries.iter().rev().map(|(k, v)| (k.clone(), *v)).collect());

            // The serializer really emits different key orders.
            prop_assert_ne!(
                serde_json::to_string(&forward).unwrap(),
                serde_json::to_string(&reverse).unwrap()
            );

            let a = CacheKey::compute("prop", &forward).unwrap();
            let b = CacheKey::compute("prop", &reverse).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
