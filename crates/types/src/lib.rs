// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # NexaFlow Ledger Types
//!
//! This crate is the foundational library for the NexaFlow ledger core,
//! containing all shared data structures, error types, result codes and
//! configuration objects.
//!
//! ## Architectural Role
//!
//! As the base crate, `nexaflow-types` has minimal dependencies and is itself
//! a dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like `AccountRoot`, `Transaction`, `Amount` and the
//! error enums.

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::TransactionError> = std::result::Result<T, E>;

/// Core application-level data structures: accounts, amounts, transactions,
/// result codes and ledger headers.
pub mod app;
/// The canonical, deterministic binary codec for consensus-critical state.
pub mod codec;
/// The full configuration surface of the ledger core (`LedgerParams`).
pub mod config;
/// A unified set of all error types used across the workspace.
pub mod error;
/// A prelude containing useful extension traits like `OptionExt`.
pub mod prelude;
