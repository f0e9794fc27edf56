// Path: crates/types/src/app/offer.rs
//! DEX offer ledger entries.

use super::{Address, Amount};
use serde::{Deserialize, Serialize};

/// A limit order on the decentralized exchange.
///
/// Offers are indexed both in the owner directory and in a per-pair offer
/// directory keyed by `(taker_pays currency, taker_gets currency)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Unique offer id (`"{owner}:{sequence}"`).
    pub id: String,
    /// The account that placed the offer.
    pub owner: Address,
    /// The account sequence the offer was created with.
    pub sequence: u32,
    /// What the taker must pay the owner.
    pub taker_pays: Amount,
    /// What the taker receives from the owner.
    pub taker_gets: Amount,
    /// Offer flags (wire-stable bitfield; currently unused bits are zero).
    pub flags: u32,
}

impl Offer {
    /// The directory pair key for this offer.
    pub fn pair(&self) -> String {
        format!("{}/{}", self.taker_pays.currency(), self.taker_gets.currency())
    }
}
