// Path: crates/types/src/app/account.rs
//! Account state: `AccountRoot` and per-holder `TrustLine`s.

use super::{Address, Drops};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The key of a trust line within an account: `(currency, issuer)`.
pub type TrustLineKey = (String, Address);

/// A line of credit extended by a holder toward an issuer.
///
/// The holder-side balance must stay non-negative; it may exceed `limit`
/// only when it already did before the current transaction (a lowered limit
/// grandfathers the existing balance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLine {
    /// Currency code, e.g. `"USD"`.
    pub currency: String,
    /// The issuing account.
    pub issuer: Address,
    /// Maximum balance the holder is willing to hold.
    pub limit: Decimal,
    /// Current holder-side balance.
    pub balance: Decimal,
}

impl TrustLine {
    /// A fresh trust line with a zero balance.
    pub fn new(currency: impl Into<String>, issuer: impl Into<Address>, limit: Decimal) -> Self {
        Self {
            currency: currency.into(),
            issuer: issuer.into(),
            limit,
            balance: Decimal::ZERO,
        }
    }

    /// Credit the holder can still receive before hitting the limit.
    pub fn available_credit(&self) -> Decimal {
        (self.limit - self.balance).max(Decimal::ZERO)
    }
}

/// The root state object of a single account.
///
/// Owned ledger objects (escrows, offers, channels, ...) are referenced
/// through the owner directory by id; the account root only carries the
/// `owner_count` that backs reserve computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRoot {
    /// The account address.
    pub address: Address,
    /// Native balance in drops.
    pub balance: Drops,
    /// Sequence number of the next transaction. Monotonically non-decreasing.
    pub sequence: u32,
    /// Number of ledger objects this account owns (drives the reserve).
    pub owner_count: u32,
    /// Optional secondary signing key. An empty assignment removes it.
    pub regular_key: Option<Address>,
    /// Trust lines held by this account, keyed by `(currency, issuer)`.
    pub trust_lines: BTreeMap<TrustLineKey, TrustLine>,
    /// When set, only preauthorized senders may deposit to this account.
    pub deposit_auth: bool,
    /// Senders preauthorized to deposit despite `deposit_auth`.
    pub preauthorized: BTreeSet<Address>,
    /// Gateways (issuers) are exempt from the zombie-account invariant.
    pub is_gateway: bool,
}

impl AccountRoot {
    /// A freshly funded account. Sequence starts at 1.
    pub fn new(address: impl Into<Address>, balance: Drops) -> Self {
        Self {
            address: address.into(),
            balance,
            sequence: 1,
            owner_count: 0,
            regular_key: None,
            trust_lines: BTreeMap::new(),
            deposit_auth: false,
            preauthorized: BTreeSet::new(),
            is_gateway: false,
        }
    }

    /// Look up a trust line by currency and issuer.
    pub fn trust_line(&self, currency: &str, issuer: &str) -> Option<&TrustLine> {
        self.trust_lines
            .get(&(currency.to_owned(), issuer.to_owned()))
    }

    /// Mutable trust-line lookup.
    pub fn trust_line_mut(&mut self, currency: &str, issuer: &str) -> Option<&mut TrustLine> {
        self.trust_lines
            .get_mut(&(currency.to_owned(), issuer.to_owned()))
    }

    /// Whether the account satisfies the deletion preconditions: sequence at
    /// least 256, nothing owned, and no trust lines.
    pub fn deletable(&self) -> bool {
        self.sequence >= 256 && self.owner_count == 0 && self.trust_lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_account_defaults() {
        let acc = AccountRoot::new("alice", 500_000_000);
        assert_eq!(acc.sequence, 1);
        assert_eq!(acc.owner_count, 0);
        assert!(!acc.deletable());
    }

    #[test]
    fn deletable_requires_seq_and_empty() {
        let mut acc = AccountRoot::new("alice", 0);
        acc.sequence = 256;
        assert!(acc.deletable());
        acc.owner_count = 1;
        assert!(!acc.deletable());
    }

    #[test]
    fn trust_line_credit() {
        let mut tl = TrustLine::new("USD", "gateway", dec!(100));
        assert_eq!(tl.available_credit(), dec!(100));
        tl.balance = dec!(120);
        assert_eq!(tl.available_credit(), dec!(0));
    }
}
