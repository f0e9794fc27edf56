// Path: crates/types/src/config.rs
//! The full configuration surface of the ledger core.

use serde::{Deserialize, Serialize};

/// Every tunable parameter of the ledger core, with the network defaults.
///
/// All values are consensus-relevant: two nodes configured differently will
/// diverge, so deployments distribute one canonical parameter file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerParams {
    /// Minimum cost of a reference transaction, in drops.
    pub base_fee_drops: u64,
    /// Base account reserve, in drops.
    pub reserve_base_drops: u64,
    /// Additional reserve per owned ledger object, in drops.
    pub reserve_increment_drops: u64,
    /// Denominator of the load factor (a factor of `load_base` means 1.0×).
    pub load_base: u32,
    /// Target number of transactions per ledger before fees escalate.
    pub target_txn_count: u32,
    /// Hard cap of transactions accepted into one open ledger.
    pub max_txn_count: u32,
    /// Maximum number of queued transactions.
    pub max_queue_size: usize,
    /// Seconds a transaction may wait in the queue before expiring.
    pub queue_max_age_secs: u64,
    /// Ledger closes a queued transaction may survive before being dropped.
    pub queue_max_retries: u32,
    /// Fraction of validators that must support an amendment.
    pub amendment_threshold: f64,
    /// Seconds a supermajority must be sustained before enablement.
    pub amendment_voting_period_secs: u64,
    /// Consecutive missed rounds before a validator is nUNL-eligible.
    pub miss_threshold: u32,
    /// Maximum fraction of the validator set allowed on the negative UNL.
    pub max_negative_unl_fraction: f64,
    /// Cooldown (seconds) before a removed validator may be re-added.
    pub nunl_readd_cooldown_secs: u64,
    /// Attestations required before a cross-chain claim pays out.
    pub min_witnesses: usize,
    /// Minimum stake, in drops.
    pub min_stake_drops: u64,
    /// Genesis supply, in drops.
    pub initial_supply_drops: u64,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            base_fee_drops: 10,
            reserve_base_drops: 10_000_000,     // 10 NXF
            reserve_increment_drops: 2_000_000, // 2 NXF per owned object
            load_base: 256,
            target_txn_count: 25,
            max_txn_count: 50,
            max_queue_size: 2000,
            queue_max_age_secs: 300,
            queue_max_retries: 10,
            amendment_threshold: 0.80,
            amendment_voting_period_secs: 14 * 86_400,
            miss_threshold: 5,
            max_negative_unl_fraction: 0.25,
            nunl_readd_cooldown_secs: 3600,
            min_witnesses: 1,
            min_stake_drops: 10_000_000, // 10 NXF
            initial_supply_drops: 10_000 * 1_000_000,
        }
    }
}
