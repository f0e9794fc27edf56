// Path: crates/types/src/app/mod.rs
//! Core application-level data structures for the ledger state machine.

/// Account state: `AccountRoot` and per-holder `TrustLine`s.
pub mod account;
/// The `Amount` type: native drops or an issued-currency value.
pub mod amount;
/// Closed-ledger headers chaining state hashes.
pub mod ledger_header;
/// DEX offer ledger entries.
pub mod offer;
/// Stable transaction result codes and their classes.
pub mod result;
/// The transaction envelope and the typed payload for every operation.
pub mod transaction;

pub use account::{AccountRoot, TrustLine, TrustLineKey};
pub use amount::Amount;
pub use ledger_header::LedgerHeader;
pub use offer::Offer;
pub use result::{ResultClass, ResultCode};
pub use transaction::{IssueSpec, PriceDatum, Transaction, TxPayload, TxType};

/// A ledger account address.
///
/// Addresses are opaque UTF-8 strings; the ledger derives all on-trie
/// object keys from them via keylets, so no base58 or checksum format is
/// imposed at this layer.
pub type Address = String;

/// The smallest unit of the native currency: one drop = 10⁻⁶ NXF.
pub type Drops = u64;

/// Drops per whole NXF.
pub const DROPS_PER_NXF: u64 = 1_000_000;

/// The currency code of the native asset.
pub const NATIVE_CURRENCY: &str = "NXF";
