// Path: crates/services/src/lib.rs
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

//! # NexaFlow Domain Services
//!
//! One module per ledger object family. Every manager owns its map from id
//! to entry (plus secondary indices), returns `Result<T, TransactionError>`
//! for expected failures, and never touches the wall clock: time-gated
//! operations take an explicit `now` in seconds.

pub mod amendments;
pub mod check;
pub mod credentials;
pub mod did;
pub mod directory;
pub mod escrow;
pub mod hooks;
pub mod mpt;
pub mod multi_sign;
pub mod negative_unl;
pub mod nftoken;
pub mod offers;
pub mod oracle;
pub mod path;
pub mod payment_channel;
pub mod staking;
pub mod ticket;
pub mod trust_graph;
pub mod xchain;
