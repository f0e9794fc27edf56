// Path: crates/services/src/negative_unl.rs

//! Negative UNL: validators temporarily excluded from quorum.
//!
//! Validators that keep missing consensus rounds are admitted to the
//! negative UNL (bounded by 25% of the validator set) so that the
//! effective quorum shrinks and the network keeps making progress.

use nexaflow_types::app::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A validator on the negative UNL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeUnlEntry {
    /// The excluded validator.
    pub validator_id: Address,
    /// When the validator was added.
    pub added_at: u64,
    /// The ledger sequence at admission.
    pub ledger_seq: u64,
    /// Why the validator was admitted.
    pub reason: String,
}

/// Manages the negative UNL.
#[derive(Debug, Clone)]
pub struct NegativeUnl {
    /// Current entries, keyed by validator id.
    pub entries: BTreeMap<Address, NegativeUnlEntry>,
    miss_counts: BTreeMap<Address, u32>,
    removal_times: BTreeMap<Address, u64>,
    miss_threshold: u32,
    max_fraction: f64,
    readd_cooldown: u64,
}

impl NegativeUnl {
    /// A negative UNL with the given miss threshold, size bound (fraction
    /// of the validator set) and re-add cooldown in seconds.
    pub fn new(miss_threshold: u32, max_fraction: f64, readd_cooldown: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            miss_counts: BTreeMap::new(),
            removal_times: BTreeMap::new(),
            miss_threshold,
            max_fraction,
            readd_cooldown,
        }
    }

    /// Number of excluded validators.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Whether a validator is currently excluded.
    pub fn is_on_negative_unl(&self, validator_id: &str) -> bool {
        self.entries.contains_key(validator_id)
    }

    /// Record whether a validator participated in a consensus round.
    /// Participation resets the miss count.
    pub fn record_validation(&mut self, validator_id: &str, participated: bool) {
        if participated {
            self.miss_counts.insert(validator_id.to_owned(), 0);
            return;
        }
        *self.miss_counts.entry(validator_id.to_owned()).or_insert(0) += 1;
    }

    /// Admit validators whose miss counts crossed the threshold, bounded by
    /// the size cap and the re-add cooldown. Returns the newly added ids.
    pub fn check_and_update(
        &mut self,
        total_validators: usize,
        ledger_seq: u64,
        now: u64,
    ) -> Vec<Address> {
        let max_size = ((total_validators as f64 * self.max_fraction) as usize).max(1);
        let mut added = Vec::new();

        let candidates: Vec<(Address, u32)> = self
            .miss_counts
            .iter()
            .map(|(id, count)| (id.clone(), *count))
            .collect();

        for (validator_id, count) in candidates {
            if self.entries.contains_key(&validator_id) || count < self.miss_threshold {
                continue;
            }
            if self.entries.len() >= max_size {
                break;
            }
            let removed_at = self.removal_times.get(&validator_id).copied().unwrap_or(0);
            if now.saturating_sub(removed_at) < self.readd_cooldown {
                continue;
            }
            log::warn!(
                "validator {} admitted to negative UNL after {} missed rounds",
                validator_id,
                count
            );
            self.entries.insert(
                validator_id.clone(),
                NegativeUnlEntry {
                    validator_id: validator_id.clone(),
                    added_at: now,
                    ledger_seq,
                    reason: format!("Missed {} consecutive rounds", count),
                },
            );
            added.push(validator_id);
        }
        added
    }

    /// Remove a validator (it is participating again). Starts the re-add
    /// cooldown.
    pub fn remove(&mut self, validator_id: &str, now: u64) -> bool {
        if self.entries.remove(validator_id).is_none() {
            return false;
        }
        self.miss_counts.insert(validator_id.to_owned(), 0);
        self.removal_times.insert(validator_id.to_owned(), now);
        true
    }

    /// The adjusted quorum over the effective (non-excluded) validator set:
    /// `round(base_quorum_pct · effective)`, minimum 1.
    pub fn adjusted_quorum(&self, total_validators: usize, base_quorum_pct: f64) -> usize {
        let effective = total_validators.saturating_sub(self.size());
        if effective == 0 {
            return 1;
        }
        ((effective as f64 * base_quorum_pct + 0.5) as usize).max(1)
    }

    /// Validators NOT on the negative UNL.
    pub fn effective_validators<'a>(&self, all: &'a [Address]) -> Vec<&'a Address> {
        all.iter()
            .filter(|v| !self.entries.contains_key(*v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nunl() -> NegativeUnl {
        NegativeUnl::new(5, 0.25, 3600)
    }

    #[test]
    fn misses_below_threshold_do_not_admit() {
        let mut unl = nunl();
        for _ in 0..4 {
            unl.record_validation("v1", false);
        }
        assert!(unl.check_and_update(8, 1, 0).is_empty());
    }

    #[test]
    fn threshold_misses_admit_and_participation_resets() {
        let mut unl = nunl();
        for _ in 0..5 {
            unl.record_validation("v1", false);
        }
        // A participating validator's count resets before the check.
        for _ in 0..5 {
            unl.record_validation("v2", false);
        }
        unl.record_validation("v2", true);

        let added = unl.check_and_update(8, 10, 100);
        assert_eq!(added, ["v1"]);
        assert!(unl.is_on_negative_unl("v1"));
        assert!(!unl.is_on_negative_unl("v2"));
    }

    #[test]
    fn size_bounded_by_quarter_of_validators() {
        let mut unl = nunl();
        for v in ["v1", "v2", "v3", "v4"] {
            for _ in 0..5 {
                unl.record_validation(v, false);
            }
        }
        // 8 validators: cap = 2.
        let added = unl.check_and_update(8, 1, 0);
        assert_eq!(added.len(), 2);
        assert_eq!(unl.size(), 2);
    }

    #[test]
    fn cooldown_blocks_readmission() {
        let mut unl = nunl();
        for _ in 0..5 {
            unl.record_validation("v1", false);
        }
        unl.check_and_update(8, 1, 10_000);
        assert!(unl.remove("v1", 10_500));

        for _ in 0..5 {
            unl.record_validation("v1", false);
        }
        // Inside the cooldown: not re-added.
        assert!(unl.check_and_update(8, 2, 10_600).is_empty());
        // After the cooldown: re-added.
        assert_eq!(unl.check_and_update(8, 3, 14_101), ["v1"]);
    }

    #[test]
    fn adjusted_quorum_shrinks_with_exclusions() {
        let mut unl = nunl();
        assert_eq!(unl.adjusted_quorum(10, 0.80), 8);
        for _ in 0..5 {
            unl.record_validation("v1", false);
        }
        unl.check_and_update(10, 1, 0);
        // 9 effective validators: round(7.2) = 7.
        assert_eq!(unl.adjusted_quorum(10, 0.80), 7);
    }

    #[test]
    fn effective_validators_filters_excluded() {
        let mut unl = nunl();
        for _ in 0..5 {
            unl.record_validation("v1", false);
        }
        unl.check_and_update(8, 1, 0);
        let all: Vec<Address> = ["v1", "v2"].iter().map(|s| s.to_string()).collect();
        let effective = unl.effective_validators(&all);
        assert_eq!(effective, [&"v2".to_string()]);
    }
}
