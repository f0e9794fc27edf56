// Path: crates/services/src/path.rs

//! Payment path finding over the trust graph.
//!
//! Native payments need no path: a single direct hop exists whenever the
//! source balance covers the amount. Issued-currency payments search the
//! directed trust graph breadth-first, issuer by issuer: an edge from
//! account A to holder H exists when H trusts A for the currency, and a
//! path's `max_amount` is the minimum available credit along it. Results
//! are ordered by `max_amount` descending, then hop count ascending.

use crate::trust_graph::TrustGraph;
use nexaflow_types::app::{Address, Drops, NATIVE_CURRENCY};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default hop bound.
pub const MAX_HOPS: usize = 6;
/// Default number of paths returned.
pub const MAX_PATHS: usize = 5;

/// One hop of a payment path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHop {
    /// The account the value passes through.
    pub account: Address,
    /// The currency at this hop.
    pub currency: String,
    /// The issuer whose obligation moves on this hop.
    pub issuer: Address,
}

/// A discovered payment path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPath {
    /// The hops from source to destination, inclusive.
    pub hops: Vec<PathHop>,
    /// The minimum available credit along the path.
    pub max_amount: Decimal,
    /// The paying account.
    pub source: Address,
    /// The receiving account.
    pub destination: Address,
    /// The delivered currency.
    pub currency: String,
}

impl PaymentPath {
    /// Number of hops in the path.
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }
}

/// Discovers payment paths through the trust graph.
#[derive(Debug)]
pub struct PathFinder<'a> {
    graph: &'a TrustGraph,
}

impl<'a> PathFinder<'a> {
    /// A finder over the given trust graph.
    pub fn new(graph: &'a TrustGraph) -> Self {
        Self { graph }
    }

    /// The single direct path for a native payment, when the source balance
    /// covers the amount.
    pub fn find_native_path(
        &self,
        source: &str,
        destination: &str,
        amount: Drops,
        source_balance: Drops,
    ) -> Vec<PaymentPath> {
        if source_balance < amount {
            return Vec::new();
        }
        vec![PaymentPath {
            hops: vec![
                PathHop {
                    account: source.to_owned(),
                    currency: NATIVE_CURRENCY.to_owned(),
                    issuer: String::new(),
                },
                PathHop {
                    account: destination.to_owned(),
                    currency: NATIVE_CURRENCY.to_owned(),
                    issuer: String::new(),
                },
            ],
            max_amount: Decimal::from(source_balance),
            source: source.to_owned(),
            destination: destination.to_owned(),
            currency: NATIVE_CURRENCY.to_owned(),
        }]
    }

    /// Breadth-first search for issued-currency paths, bounded by
    /// [`MAX_HOPS`] and [`MAX_PATHS`].
    pub fn find_iou_paths(
        &self,
        source: &str,
        destination: &str,
        currency: &str,
    ) -> Vec<PaymentPath> {
        self.find_iou_paths_bounded(source, destination, currency, MAX_HOPS, MAX_PATHS)
    }

    /// Breadth-first search with explicit bounds.
    pub fn find_iou_paths_bounded(
        &self,
        source: &str,
        destination: &str,
        currency: &str,
        max_hops: usize,
        max_paths: usize,
    ) -> Vec<PaymentPath> {
        let mut found: Vec<PaymentPath> = Vec::new();

        let start = PathHop {
            account: source.to_owned(),
            currency: currency.to_owned(),
            issuer: source.to_owned(),
        };
        let mut queue: VecDeque<(Address, Vec<PathHop>, Decimal)> = VecDeque::new();
        queue.push_back((source.to_owned(), vec![start], Decimal::MAX));

        while let Some((current, path, min_credit)) = queue.pop_front() {
            if found.len() >= max_paths {
                break;
            }
            if path.len() > max_hops {
                continue;
            }
            // Expand to every holder that trusts `current` as issuer.
            for edge in self.graph.trustees(&current) {
                if edge.currency != currency {
                    continue;
                }
                let holder = &edge.account;
                if path.iter().any(|hop| hop.account == *holder) {
                    continue; // no cycles
                }
                let credit = (edge.limit - edge.balance).max(Decimal::ZERO);
                if credit <= Decimal::ZERO {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(PathHop {
                    account: holder.clone(),
                    currency: currency.to_owned(),
                    issuer: current.clone(),
                });
                let next_min = min_credit.min(credit);
                if holder == destination {
                    found.push(PaymentPath {
                        hops: next_path,
                        max_amount: next_min,
                        source: source.to_owned(),
                        destination: destination.to_owned(),
                        currency: currency.to_owned(),
                    });
                } else {
                    queue.push_back((holder.clone(), next_path, next_min));
                }
            }
        }

        found.sort_by(|a, b| {
            b.max_amount
                .cmp(&a.max_amount)
                .then(a.hops.len().cmp(&b.hops.len()))
        });
        found.truncate(max_paths);
        found
    }

    /// Cross-currency routing bridged through the native asset: the source
    /// leg spends `source_currency` back toward its issuer, the middle leg
    /// moves native value, and the destination leg delivers
    /// `destination_currency` from an issuer the destination trusts.
    pub fn find_bridged_path(
        &self,
        source: &str,
        destination: &str,
        source_currency: &str,
        destination_currency: &str,
    ) -> Option<PaymentPath> {
        let source_edge = self
            .graph
            .trusted_issuers(source)
            .iter()
            .find(|e| e.currency == source_currency && e.balance > Decimal::ZERO)?;
        let dest_edge = self
            .graph
            .trusted_issuers(destination)
            .iter()
            .find(|e| {
                e.currency == destination_currency
                    && (e.limit - e.balance) > Decimal::ZERO
            })?;

        let max_amount = source_edge
            .balance
            .min(dest_edge.limit - dest_edge.balance);
        Some(PaymentPath {
            hops: vec![
                PathHop {
                    account: source.to_owned(),
                    currency: source_currency.to_owned(),
                    issuer: source_edge.account.clone(),
                },
                PathHop {
                    account: source_edge.account.clone(),
                    currency: NATIVE_CURRENCY.to_owned(),
                    issuer: String::new(),
                },
                PathHop {
                    account: dest_edge.account.clone(),
                    currency: NATIVE_CURRENCY.to_owned(),
                    issuer: String::new(),
                },
                PathHop {
                    account: destination.to_owned(),
                    currency: destination_currency.to_owned(),
                    issuer: dest_edge.account.clone(),
                },
            ],
            max_amount,
            source: source.to_owned(),
            destination: destination.to_owned(),
            currency: destination_currency.to_owned(),
        })
    }

    /// The single best path: highest liquidity, fewest hops.
    pub fn find_best_path(
        &self,
        source: &str,
        destination: &str,
        currency: &str,
    ) -> Option<PaymentPath> {
        self.find_iou_paths(source, destination, currency)
            .into_iter()
            .next()
    }
}
