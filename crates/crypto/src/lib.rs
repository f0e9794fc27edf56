// Path: crates/crypto/src/lib.rs
//! # NexaFlow Crypto Crate Lints
//!
//! Panics are disallowed in non-test code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]
//! # NexaFlow Cryptography
//!
//! Hash primitives shared by the whole ledger core. The ledger uses exactly
//! two digests: SHA-512-Half for keylets, SHAMap leaves and inner nodes, and
//! SHA-256 for escrow crypto-conditions and content-derived identifiers.

pub mod algorithms;

pub use algorithms::hash::{sha256, sha256_hex, sha512_half, Hash256};
