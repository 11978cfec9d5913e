// src/utils/serialization.rs
//! Canonical JSON serialization for the identity system.
//!
//! The DID is a content hash of its document, and every signature covers a
//! serialized form, so serialization must be deterministic: struct fields are
//! emitted in declaration order, optional fields are skipped when absent, and
//! no insignificant whitespace is produced. Two semantically equal documents
//! built by the same constructors therefore serialize identically.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Error;

/// Serializes a value to its canonical JSON form.
///
/// # Arguments
/// * `data` - The value to serialize (must implement `Serialize`)
///
/// # Errors
/// Returns [`Error::Encoding`] if serialization fails.
pub fn to_canonical_json<T: Serialize>(data: &T) -> Result<String, Error> {
    serde_json::to_string(data).map_err(|e| Error::Encoding(format!("serialization failed: {}", e)))
}

/// Deserializes a value from a JSON string.
///
/// # Arguments
/// * `data` - JSON string to deserialize
///
/// # Errors
/// Returns [`Error::Encoding`] if the input is not valid JSON for `T`.
pub fn from_json<T: DeserializeOwned>(data: &str) -> Result<T, Error> {
    serde_json::from_str(data).map_err(|e| Error::Encoding(format!("deserialization failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        b: String,
        a: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        c: Option<String>,
    }

    #[test]
    fn canonical_form_is_stable_and_compact() {
        let value = Sample {
            b: "x".to_string(),
            a: 1,
            c: None,
        };
        let first = to_canonical_json(&value).unwrap();
        let second = to_canonical_json(&value).unwrap();
        assert_eq!(first, second);
        // Declaration order, no whitespace, absent optionals skipped.
        assert_eq!(first, r#"{"b":"x","a":1}"#);
    }

    #[test]
    fn round_trip_preserves_value() {
        let value = Sample {
            b: "y".to_string(),
            a: 2,
            c: Some("z".to_string()),
        };
        let json = to_canonical_json(&value).unwrap();
        let back: Sample = from_json(&json).unwrap();
        assert_eq!(back, value);
    }
}
