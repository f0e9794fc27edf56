// Path: crates/execution/src/lib.rs
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

//! # NexaFlow Execution
//!
//! The deterministic heart of the ledger: the `Ledger` aggregate owning all
//! domain state and the SHAMap, the transaction apply pipeline
//! (validate → fee gate → snapshot → dispatch → invariant check →
//! commit or rollback → metadata → SHAMap refresh), the post-application
//! invariant checker, and the transaction metadata builder.

mod apply;
pub mod invariants;
pub mod ledger;
pub mod metadata;

pub use invariants::{InvariantChecker, LedgerSnapshot};
pub use ledger::{ApplyOutcome, Ledger, LedgerState};
pub use metadata::{AffectedNode, BalanceChange, MetadataBuilder, NodeAction, TransactionMetadata};
