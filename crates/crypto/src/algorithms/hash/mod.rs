// Path: crates/crypto/src/algorithms/hash/mod.rs
//! Cryptographic hash functions for the ledger core.

use sha2::{Digest, Sha256, Sha512};

/// A 256-bit digest, the universal key and hash width of the ledger.
pub type Hash256 = [u8; 32];

/// SHA-512-Half: the first 256 bits (32 bytes) of SHA-512.
///
/// Used for every keylet, SHAMap leaf hash and SHAMap inner-node hash.
pub fn sha512_half(data: &[u8]) -> Hash256 {
    let digest = Sha512::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

/// Plain SHA-256, used for escrow conditions and derived object identifiers.
pub fn sha256(data: &[u8]) -> Hash256 {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// SHA-256 of the input, hex-encoded. Convenience for condition fields that
/// are carried as hex strings.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

#[cfg(test)]
mod tests;
