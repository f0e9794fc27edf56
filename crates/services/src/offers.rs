// Path: crates/services/src/offers.rs

//! DEX offer bookkeeping.
//!
//! Owns the offer entries and keeps them indexed in per-pair offer
//! directories. Matching/crossing is outside the core; the book exists so
//! offers occupy owner reserve, appear in directories, and can be
//! enumerated by pair.

use crate::directory::DirectoryManager;
use nexaflow_types::app::{Amount, Offer};
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owns all DEX offers, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferBook {
    /// All open offers.
    pub offers: BTreeMap<String, Offer>,
}

impl OfferBook {
    /// Place a new offer and index it in the pair directory.
    pub fn create_offer(
        &mut self,
        owner: &str,
        sequence: u32,
        taker_pays: Amount,
        taker_gets: Amount,
        directories: &mut DirectoryManager,
    ) -> Result<&Offer, TransactionError> {
        if taker_pays.is_zero() || taker_gets.is_zero() {
            return Err(TransactionError::BadAmount(
                "Offer amounts must be positive".into(),
            ));
        }
        let id = format!("{}:{}", owner, sequence);
        if self.offers.contains_key(&id) {
            return Err(TransactionError::Duplicate("Offer already exists".into()));
        }
        let offer = Offer {
            id: id.clone(),
            owner: owner.to_owned(),
            sequence,
            taker_pays,
            taker_gets,
            flags: 0,
        };
        directories.offer_dir_mut(&offer.pair()).add_offer(&id);
        self.offers.insert(id.clone(), offer);
        Ok(&self.offers[&id])
    }

    /// Cancel an offer by its creating sequence; only the owner may cancel.
    pub fn cancel_offer(
        &mut self,
        owner: &str,
        sequence: u32,
        directories: &mut DirectoryManager,
    ) -> Result<Offer, TransactionError> {
        let id = format!("{}:{}", owner, sequence);
        let offer = self
            .offers
            .remove(&id)
            .ok_or_else(|| TransactionError::NotFound(format!("Offer {}", id)))?;
        directories.offer_dir_mut(&offer.pair()).remove_offer(&id);
        Ok(offer)
    }

    /// Look up an offer by id.
    pub fn get_offer(&self, id: &str) -> Option<&Offer> {
        self.offers.get(id)
    }

    /// Open offers placed by an account.
    pub fn offers_for_account(&self, owner: &str) -> Vec<&Offer> {
        self.offers.values().filter(|o| o.owner == owner).collect()
    }
}
