// Path: crates/state/src/lib.rs
//! # NexaFlow State Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]
//! # NexaFlow State
//!
//! The Merkle-authenticated state layer: deterministic keylets addressing
//! every ledger object, and the 16-ary SHAMap trie whose root hash
//! identifies the entire ledger state.

pub mod keylet;
pub mod shamap;

pub use keylet::{compute_keylet, LedgerSpace};
pub use shamap::{MerkleProof, SHAMap};
