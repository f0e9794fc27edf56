// Path: crates/tx/src/lib.rs
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

//! # NexaFlow Transaction Engine
//!
//! Everything that happens to a transaction before a domain handler sees it:
//! the stateless validator, the fee/reserve model, and the escalation queue
//! that decides between immediate inclusion, deferral and rejection.

pub mod fees;
pub mod queue;
pub mod validation;

pub use fees::FeeModel;
pub use queue::{FeeEscalation, QueuedTransaction, SubmitOutcome};
pub use validation::{LedgerReader, TransactionValidator};
