// Path: crates/types/src/app/ledger_header.rs
//! Closed-ledger headers.

use nexaflow_crypto::Hash256;
use serde::{Deserialize, Serialize};

/// The header of a closed ledger.
///
/// Headers chain by hash: `ledger(n+1).parent_hash == ledger(n).state_hash`,
/// and sequences are strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    /// Strictly increasing ledger sequence number.
    pub sequence: u64,
    /// The state hash of the previous closed ledger.
    pub parent_hash: Hash256,
    /// The SHAMap root hash after applying this ledger's transactions.
    pub state_hash: Hash256,
    /// Close time in seconds.
    pub close_time: u64,
    /// Number of transactions recorded in this ledger.
    pub tx_count: u32,
}
