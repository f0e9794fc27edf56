// Path: crates/crypto/src/algorithms/hash/tests.rs
//! Tests for hash function implementations

use super::{sha256, sha256_hex, sha512_half};

#[test]
fn test_digest_widths() {
    let message = b"test message";

    assert_eq!(sha512_half(message).len(), 32);
    assert_eq!(sha256(message).len(), 32);

    // Deterministic
    assert_eq!(sha512_half(message), sha512_half(message));
    assert_eq!(sha256(message), sha256(message));
}

#[test]
fn test_sha256_known_answer() {
    // SHA-256("abc"), FIPS 180-2 test vector
    assert_eq!(
        sha256_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn test_sha512_half_is_sha512_prefix() {
    use sha2::{Digest, Sha512};
    let full = Sha512::digest(b"nexaflow");
    assert_eq!(sha512_half(b"nexaflow")[..], full[..32]);
}

#[test]
fn test_distinct_inputs_distinct_digests() {
    assert_ne!(sha512_half(b"a"), sha512_half(b"b"));
    assert_ne!(sha256(b"a"), sha256(b"b"));
}
