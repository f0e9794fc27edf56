// Path: crates/types/src/codec.rs

//! Defines the canonical, deterministic binary codec for all
//! consensus-critical state.
//!
//! This module provides simple wrappers around `bincode`, whose encoding of
//! a fixed Rust type is deterministic: struct fields serialize in
//! declaration order (the documented canonical field order) and ordered
//! collections (`BTreeMap`/`BTreeSet`) serialize in key order. By
//! centralizing the codec here in the base `types` crate we ensure every
//! component produces the exact same leaf bytes for the same object, which
//! is what makes the SHAMap root hash reproducible across nodes.

use serde::{de::DeserializeOwned, Serialize};

/// Encodes a value into its canonical byte representation.
///
/// Use this for everything that is written to a SHAMap leaf, hashed, or
/// signed.
pub fn to_bytes_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, String> {
    bincode::serialize(v).map_err(|e| format!("canonical encode failed: {}", e))
}

/// Decodes a value from its canonical byte representation.
///
/// Fails fast on any decoding error with a descriptive message; malformed
/// state bytes must never be silently accepted in a consensus context.
pub fn from_bytes_canonical<T: DeserializeOwned>(b: &[u8]) -> Result<T, String> {
    bincode::deserialize(b).map_err(|e| format!("canonical decode failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeSet;

    #[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
    struct TestStruct {
        id: u32,
        name: String,
        tags: Vec<u8>,
    }

    #[test]
    fn test_canonical_codec_roundtrip() {
        let original = TestStruct {
            id: 42,
            name: "test-data".to_string(),
            tags: vec![1, 2, 3],
        };

        let encoded = to_bytes_canonical(&original).unwrap();
        assert!(!encoded.is_empty());

        let decoded = from_bytes_canonical::<TestStruct>(&encoded).unwrap();
        assert_eq!(original, decoded);

        // Ordered collections keep their canonical order
        let mut set = BTreeSet::new();
        set.insert([3u8; 32]);
        set.insert([1u8; 32]);
        set.insert([2u8; 32]);

        let encoded_set = to_bytes_canonical(&set).unwrap();
        let decoded_set = from_bytes_canonical::<BTreeSet<[u8; 32]>>(&encoded_set).unwrap();
        assert_eq!(set, decoded_set);
    }

    #[test]
    fn test_canonical_encoding_is_stable() {
        let a = TestStruct {
            id: 7,
            name: "same".into(),
            tags: vec![9],
        };
        let b = TestStruct {
            id: 7,
            name: "same".into(),
            tags: vec![9],
        };
        assert_eq!(
            to_bytes_canonical(&a).unwrap(),
            to_bytes_canonical(&b).unwrap()
        );
    }

    #[test]
    fn test_canonical_decode_failure() {
        let original = TestStruct {
            id: 99,
            name: "another-test".to_string(),
            tags: vec![10, 20, 30],
        };

        let mut encoded = to_bytes_canonical(&original).unwrap();
        encoded.pop();
        encoded.pop();

        let result = from_bytes_canonical::<TestStruct>(&encoded);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("canonical decode failed"));
    }
}
