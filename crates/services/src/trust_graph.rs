// Path: crates/services/src/trust_graph.rs

//! The network-wide trust graph.
//!
//! A directed graph rebuilt from the ledger's trust lines:
//! holder --trusts(currency, limit, balance)--> issuer. The path finder
//! queries it for available credit along candidate payment routes.

use nexaflow_types::app::{AccountRoot, Address};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One edge of the trust graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustEdge {
    /// The counterparty (issuer on forward edges, holder on reverse).
    pub account: Address,
    /// The trusted currency.
    pub currency: String,
    /// The holder's limit.
    pub limit: Decimal,
    /// The holder's current balance.
    pub balance: Decimal,
}

/// A directed graph of trust relationships across all accounts.
#[derive(Debug, Clone, Default)]
pub struct TrustGraph {
    forward: BTreeMap<Address, Vec<TrustEdge>>,
    reverse: BTreeMap<Address, Vec<TrustEdge>>,
}

impl TrustGraph {
    /// Rebuild the graph from the ledger's accounts.
    pub fn build_from_accounts<'a, I>(&mut self, accounts: I)
    where
        I: IntoIterator<Item = &'a AccountRoot>,
    {
        self.forward.clear();
        self.reverse.clear();
        for account in accounts {
            for ((currency, issuer), line) in &account.trust_lines {
                self.forward
                    .entry(account.address.clone())
                    .or_default()
                    .push(TrustEdge {
                        account: issuer.clone(),
                        currency: currency.clone(),
                        limit: line.limit,
                        balance: line.balance,
                    });
                self.reverse
                    .entry(issuer.clone())
                    .or_default()
                    .push(TrustEdge {
                        account: account.address.clone(),
                        currency: currency.clone(),
                        limit: line.limit,
                        balance: line.balance,
                    });
            }
        }
    }

    /// Holders that trust `issuer`.
    pub fn trustees(&self, issuer: &str) -> &[TrustEdge] {
        self.reverse.get(issuer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Issuers that `holder` trusts.
    pub fn trusted_issuers(&self, holder: &str) -> &[TrustEdge] {
        self.forward.get(holder).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether `holder` has a trust line to `issuer` for `currency`.
    pub fn has_trust(&self, holder: &str, issuer: &str, currency: &str) -> bool {
        self.forward
            .get(holder)
            .is_some_and(|edges| edges.iter().any(|e| e.account == issuer && e.currency == currency))
    }

    /// How much more of `currency` the holder can receive from `issuer`.
    pub fn available_credit(&self, holder: &str, issuer: &str, currency: &str) -> Decimal {
        self.forward
            .get(holder)
            .and_then(|edges| {
                edges
                    .iter()
                    .find(|e| e.account == issuer && e.currency == currency)
            })
            .map(|e| (e.limit - e.balance).max(Decimal::ZERO))
            .unwrap_or(Decimal::ZERO)
    }

    /// Every currency present in the graph.
    pub fn all_currencies(&self) -> BTreeSet<String> {
        self.forward
            .values()
            .flatten()
            .map(|e| e.currency.clone())
            .collect()
    }

    /// Total number of trust lines in the graph.
    pub fn line_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexaflow_types::app::TrustLine;
    use rust_decimal_macros::dec;

    fn account_with_line(address: &str, currency: &str, issuer: &str, limit: Decimal, balance: Decimal) -> AccountRoot {
        let mut acc = AccountRoot::new(address, 0);
        let mut line = TrustLine::new(currency, issuer, limit);
        line.balance = balance;
        acc.trust_lines
            .insert((currency.to_owned(), issuer.to_owned()), line);
        acc
    }

    #[test]
    fn build_and_query() {
        let alice = account_with_line("alice", "USD", "gateway", dec!(100), dec!(30));
        let bob = account_with_line("bob", "USD", "gateway", dec!(50), dec!(0));
        let mut graph = TrustGraph::default();
        graph.build_from_accounts([&alice, &bob]);

        assert!(graph.has_trust("alice", "gateway", "USD"));
        assert!(!graph.has_trust("gateway", "alice", "USD"));
        assert_eq!(graph.available_credit("alice", "gateway", "USD"), dec!(70));
        assert_eq!(graph.available_credit("carol", "gateway", "USD"), dec!(0));
        assert_eq!(graph.trustees("gateway").len(), 2);
        assert_eq!(graph.line_count(), 2);
        assert!(graph.all_currencies().contains("USD"));
    }

    #[test]
    fn over_limit_balance_has_zero_credit() {
        let alice = account_with_line("alice", "USD", "gateway", dec!(10), dec!(15));
        let mut graph = TrustGraph::default();
        graph.build_from_accounts([&alice]);
        assert_eq!(graph.available_credit("alice", "gateway", "USD"), dec!(0));
    }
}
