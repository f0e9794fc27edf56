// Path: crates/services/src/amendments.rs

//! Amendment voting: network-wide feature gating.
//!
//! Validators vote on proposed amendments; once a supermajority (80%) has
//! been sustained for the full voting period, the amendment becomes
//! enabled. Losing the supermajority at any point resets the timer.

use nexaflow_crypto::sha256;
use nexaflow_types::app::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The lifecycle state of an amendment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmendmentStatus {
    /// Known but not yet open for voting.
    Proposed,
    /// Collecting validator votes.
    Voting,
    /// Permanently active.
    Enabled,
    /// Blocked by operator veto.
    Vetoed,
}

/// A single protocol amendment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendment {
    /// Deterministic id: SHA-256 of the name, hex-encoded.
    pub amendment_id: String,
    /// Human-readable name.
    pub name: String,
    /// What the amendment does.
    pub description: String,
    /// Current lifecycle state.
    pub status: AmendmentStatus,
    /// Validators voting in favor.
    pub votes_for: BTreeSet<Address>,
    /// Validators voting against.
    pub votes_against: BTreeSet<Address>,
    /// When the supermajority was first reached; 0 = not currently held.
    pub first_majority_time: u64,
    /// When the amendment was enabled; 0 until then.
    pub enabled_time: u64,
}

/// Tracks and processes amendment proposals and votes.
#[derive(Debug, Clone)]
pub struct AmendmentManager {
    /// All amendments, keyed by id.
    pub amendments: BTreeMap<String, Amendment>,
    enabled: BTreeSet<String>,
    voting_period: u64,
    threshold: f64,
}

impl AmendmentManager {
    /// A manager with the given sustained-majority window (seconds) and
    /// supermajority threshold (e.g. 0.80).
    pub fn new(voting_period: u64, threshold: f64) -> Self {
        Self {
            amendments: BTreeMap::new(),
            enabled: BTreeSet::new(),
            voting_period,
            threshold,
        }
    }

    /// Deterministic amendment id from its name (64 hex chars).
    pub fn compute_amendment_id(name: &str) -> String {
        hex::encode(sha256(name.as_bytes()))
    }

    /// Propose an amendment for voting. Proposing an existing name returns
    /// the same instance.
    pub fn propose(&mut self, name: &str, description: &str) -> &Amendment {
        let amendment_id = Self::compute_amendment_id(name);
        self.amendments
            .entry(amendment_id.clone())
            .or_insert_with(|| {
                log::info!("amendment '{}' proposed ({})", name, amendment_id);
                Amendment {
                    amendment_id,
                    name: name.to_owned(),
                    description: description.to_owned(),
                    status: AmendmentStatus::Voting,
                    votes_for: BTreeSet::new(),
                    votes_against: BTreeSet::new(),
                    first_majority_time: 0,
                    enabled_time: 0,
                }
            })
    }

    /// Record a validator's vote. Returns false for unknown or settled
    /// amendments.
    pub fn vote(&mut self, amendment_id: &str, validator_id: &str, support: bool) -> bool {
        let Some(amendment) = self.amendments.get_mut(amendment_id) else {
            return false;
        };
        if matches!(
            amendment.status,
            AmendmentStatus::Enabled | AmendmentStatus::Vetoed
        ) {
            return false;
        }
        if support {
            amendment.votes_for.insert(validator_id.to_owned());
            amendment.votes_against.remove(validator_id);
        } else {
            amendment.votes_against.insert(validator_id.to_owned());
            amendment.votes_for.remove(validator_id);
        }
        true
    }

    /// Process one voting round (call at every ledger close). Returns the
    /// names of newly enabled amendments.
    pub fn process_voting_round(&mut self, total_validators: usize, now: u64) -> Vec<String> {
        if total_validators == 0 {
            return Vec::new();
        }
        let mut newly_enabled = Vec::new();

        for amendment in self.amendments.values_mut() {
            if amendment.status != AmendmentStatus::Voting {
                continue;
            }
            let support_ratio = amendment.votes_for.len() as f64 / total_validators as f64;

            if support_ratio >= self.threshold {
                if amendment.first_majority_time == 0 {
                    amendment.first_majority_time = now;
                } else if now - amendment.first_majority_time >= self.voting_period {
                    amendment.status = AmendmentStatus::Enabled;
                    amendment.enabled_time = now;
                    self.enabled.insert(amendment.amendment_id.clone());
                    log::info!("amendment '{}' enabled at {}", amendment.name, now);
                    newly_enabled.push(amendment.name.clone());
                }
            } else {
                // Lost the supermajority: the clock restarts from zero.
                amendment.first_majority_time = 0;
            }
        }
        newly_enabled
    }

    /// Whether an amendment is enabled; accepts a name or an id.
    pub fn is_enabled(&self, name_or_id: &str) -> bool {
        self.enabled.contains(name_or_id)
            || self.enabled.contains(&Self::compute_amendment_id(name_or_id))
    }

    /// Operator veto. Enabled amendments cannot be vetoed.
    pub fn veto(&mut self, amendment_id: &str) -> bool {
        match self.amendments.get_mut(amendment_id) {
            Some(amendment) if amendment.status != AmendmentStatus::Enabled => {
                amendment.status = AmendmentStatus::Vetoed;
                true
            }
            _ => false,
        }
    }

    /// Ids of all enabled amendments, sorted.
    pub fn enabled_ids(&self) -> Vec<&String> {
        self.enabled.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> AmendmentManager {
        // A 10-second voting period keeps the tests readable.
        AmendmentManager::new(10, 0.80)
    }

    #[test]
    fn amendment_id_is_deterministic_64_hex() {
        let a = AmendmentManager::compute_amendment_id("BigFeature");
        let b = AmendmentManager::compute_amendment_id("BigFeature");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn propose_twice_returns_same_instance() {
        let mut mgr = manager();
        let id1 = mgr.propose("BigFeature", "d").amendment_id.clone();
        let id2 = mgr.propose("BigFeature", "other").amendment_id.clone();
        assert_eq!(id1, id2);
        assert_eq!(mgr.amendments.len(), 1);
    }

    #[test]
    fn sustained_supermajority_enables() {
        let mut mgr = manager();
        let id = mgr.propose("BigFeature", "").amendment_id.clone();
        for v in 0..8 {
            mgr.vote(&id, &format!("v{}", v), true);
        }

        // 8/10 validators at t=1000: majority starts, nothing enabled yet.
        assert!(mgr.process_voting_round(10, 1000).is_empty());
        assert_eq!(mgr.amendments[&id].first_majority_time, 1000);

        // Still inside the voting period.
        assert!(mgr.process_voting_round(10, 1005).is_empty());
        assert!(!mgr.is_enabled("BigFeature"));

        // Sustained for the full period: enabled.
        let enabled = mgr.process_voting_round(10, 1011);
        assert_eq!(enabled, ["BigFeature"]);
        assert!(mgr.is_enabled("BigFeature"));
        assert!(mgr.is_enabled(&id));
    }

    #[test]
    fn losing_majority_resets_timer() {
        let mut mgr = manager();
        let id = mgr.propose("Feature", "").amendment_id.clone();
        for v in 0..8 {
            mgr.vote(&id, &format!("v{}", v), true);
        }
        mgr.process_voting_round(10, 100);
        assert_eq!(mgr.amendments[&id].first_majority_time, 100);

        // One validator flips: 7/10 < 0.80.
        mgr.vote(&id, "v0", false);
        mgr.process_voting_round(10, 105);
        assert_eq!(mgr.amendments[&id].first_majority_time, 0);

        // Regaining the majority restarts the clock.
        mgr.vote(&id, "v0", true);
        mgr.process_voting_round(10, 200);
        assert_eq!(mgr.amendments[&id].first_majority_time, 200);
        assert!(mgr.process_voting_round(10, 209).is_empty());
        assert_eq!(mgr.process_voting_round(10, 210), ["Feature"]);
    }

    #[test]
    fn veto_blocks_voting_but_not_enabled() {
        let mut mgr = manager();
        let id = mgr.propose("Feature", "").amendment_id.clone();
        assert!(mgr.veto(&id));
        assert!(!mgr.vote(&id, "v1", true));

        let id2 = mgr.propose("Other", "").amendment_id.clone();
        for v in 0..10 {
            mgr.vote(&id2, &format!("v{}", v), true);
        }
        mgr.process_voting_round(10, 0);
        mgr.process_voting_round(10, 10);
        assert!(mgr.is_enabled("Other"));
        assert!(!mgr.veto(&id2));
    }
}
