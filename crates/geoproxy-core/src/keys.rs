//! Cache key derivation.
//!
//! Keys are derived from a namespace and a serializable parameter set:
//!
//! 1. The parameters are serialized to canonical JSON (object keys sorted,
//!    no whitespace), so field order never changes the key.
//! 2. `namespace`, a NUL separator and the canonical JSON are hashed with
//!    SHA-256.
//! 3. The digest is encoded as URL-safe base64 without padding and truncated
//!    to [`CacheKey::DIGEST_LEN`] characters (96 bits).
//!
//! Truncation keeps keys short for the distributed backends. With 96 bits a
//! collision needs on the order of 2^48 distinct parameter sets in one
//! namespace.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Key unica para una entrada de cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of a derived key, in base64 characters.
    pub const DIGEST_LEN: usize = 16;

    /// Derives a key from a namespace and a parameter set.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoproxy_core::CacheKey;
    /// use serde_json::json;
    ///
    /// let a = CacheKey::derive("traffic", &json!({"lat": 1.5, "lng": 2.5})).unwrap();
    /// let b = CacheKey::derive("traffic", &json!({"lng": 2.5, "lat": 1.5})).unwrap();
    /// assert_eq!(a, b);
    /// ```
    ///
    /// # Errors
    ///
    /// Fails only if `params` cannot be represented as JSON (e.g. a map with
    /// non-string keys).
    pub fn derive<P>(namespace: &str, params: &P) -> Result<Self, serde_json::Error>
    where
        P: Serialize + ?Sized,
    {
        let value = serde_json::to_value(params)?;
        let mut canonical = String::new();
        write_canonical(&value, &mut canonical);

        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();

        let mut encoded = URL_SAFE_NO_PAD.encode(digest);
        encoded.truncate(Self::DIGEST_LEN);
        Ok(Self(encoded))
    }

    /// Wraps an already-computed key without hashing it.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Retorna la key como string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writes `value` as JSON with object keys in lexicographic order.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        },
        Value::String(s) => write_string(s, out),
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    // Value::String siempre serializa a JSON valido
    out.push_str(&Value::String(s.to_owned()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derive_is_deterministic() {
        let params = json!({"lat": 40.7128, "lng": -74.006, "provider": "tomtom"});

        let key1 = CacheKey::derive("traffic", &params).unwrap();
        let key2 = CacheKey::derive("traffic", &params).unwrap();

        assert_eq!(key1, key2);
        assert_eq!(key1.as_str().len(), CacheKey::DIGEST_LEN);
    }

    #[test]
    fn test_derive_ignores_field_order() {
        let key1 = CacheKey::derive("traffic", &json!({"a": 1, "b": {"x": 1, "y": 2}})).unwrap();
        let key2 = CacheKey::derive("traffic", &json!({"b": {"y": 2, "x": 1}, "a": 1})).unwrap();

        assert_eq!(key1, key2);
    }

    #[test]
    fn test_namespace_changes_key() {
        let params = json!({"lat": 1.0});

        let key1 = CacheKey::derive("traffic", &params).unwrap();
        let key2 = CacheKey::derive("weather", &params).unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_distinct_params_produce_distinct_keys() {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        for i in 0..1000 {
            let key = CacheKey::derive("traffic", &json!({"lat": i, "lng": -i})).unwrap();
            assert!(seen.insert(key), "collision at {}", i);
        }
    }

    #[test]
    fn test_key_is_url_safe() {
        let key = CacheKey::derive("traffic", &json!({"q": "a/b+c"})).unwrap();

        assert!(
            key.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_canonical_json() {
        let mut out = String::new();
        write_canonical(&json!({"z": [1, {"b": true, "a": null}], "a": "x\"y"}), &mut out);

        assert_eq!(out, r#"{"a":"x\"y","z":[1,{"a":null,"b":true}]}"#);
    }

    #[test]
    fn test_from_raw_and_display() {
        let key = CacheKey::from_raw("plain-key");

        assert_eq!(key.to_string(), "plain-key");
        assert_eq!(key.as_ref(), "plain-key");
    }
}
