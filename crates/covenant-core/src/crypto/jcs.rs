//! JSON Canonicalization Scheme (RFC 8785).
//!
//! Deterministic serialization for everything that gets signed or hashed.
//! `serde_jcs` guarantees lexicographic key ordering, no insignificant
//! whitespace, UTF-8 output, and IEEE 754 number normalization, so two
//! parties serializing the same logical value always agree byte-for-byte.
//! This is the trust anchor for every signature in the protocol.

use serde::Serialize;
use thiserror::Error;

/// A value could not be canonically encoded (non-finite float, map with
/// non-string keys, and similar caller bugs).
#[derive(Debug, Error)]
#[error("canonical encoding failed: {0}")]
pub struct EncodingError(#[from] serde_json::Error);

/// Serialize a value to JCS canonical bytes.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodingError> {
    Ok(serde_jcs::to_vec(value)?)
}

/// Serialize a value to a JCS canonical string.
pub fn to_string<T: Serialize>(value: &T) -> Result<String, EncodingError> {
    Ok(serde_jcs::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_ordering_is_lexicographic() {
        let input = json!({
            "z": 3,
            "b": 2,
            "a": 1,
            "m": 4
        });

        let canonical = to_string(&input).unwrap();
        assert_eq!(canonical, r#"{"a":1,"b":2,"m":4,"z":3}"#);
    }

    #[test]
    fn nested_objects_are_ordered_recursively() {
        let input = json!({
            "outer": {
                "z": 1,
                "a": 2
            },
            "first": true
        });

        let canonical = to_string(&input).unwrap();
        assert_eq!(canonical, r#"{"first":true,"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn no_insignificant_whitespace() {
        let input = json!({
            "key": "value",
            "array": [1, 2, 3]
        });

        let canonical = to_string(&input).unwrap();
        assert!(!canonical.contains(' '));
        assert!(!canonical.contains('\n'));
    }

    #[test]
    fn array_order_is_preserved() {
        let input = json!({
            "array": [3, 1, 2]
        });

        let canonical = to_string(&input).unwrap();
        assert_eq!(canonical, r#"{"array":[3,1,2]}"#);
    }

    #[test]
    fn construction_order_does_not_matter() {
        let input1 = json!({"a": 1, "b": 2});
        let input2 = json!({"b": 2, "a": 1});

        assert_eq!(to_vec(&input1).unwrap(), to_vec(&input2).unwrap());
    }

    #[test]
    fn unicode_stays_utf8() {
        let input = json!({
            "chinese": "中文",
            "accented": "café"
        });

        let canonical = String::from_utf8(to_vec(&input).unwrap()).unwrap();
        assert!(canonical.contains("中文"));
        assert!(canonical.contains("café"));
    }

    #[test]
    fn non_finite_numbers_fail() {
        assert!(to_vec(&f64::NAN).is_err());
        assert!(to_vec(&f64::INFINITY).is_err());
    }
}
