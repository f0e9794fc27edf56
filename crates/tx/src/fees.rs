// Path: crates/tx/src/fees.rs

//! The transaction cost model: reserves, load factor and fee levels.
//!
//! * **Base fee**: the minimum cost in drops for a reference transaction.
//! * **Load factor**: scales the base fee with how busy recent ledgers
//!   were; `load_factor / load_base` is the multiplier.
//! * **Reserves**: the balance an account must retain, growing with each
//!   owned ledger object.
//!
//! All arithmetic is integer drops, so every node computes identical fees.

use nexaflow_types::app::Drops;
use nexaflow_types::config::LedgerParams;
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};

/// One fee level unit is 1/256 of the reference transaction cost.
pub const FEE_LEVEL_SCALE: u64 = 256;

/// The current fee schedule of the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Minimum cost of a reference transaction, in drops.
    pub base_fee_drops: Drops,
    /// Base account reserve, in drops.
    pub reserve_base_drops: Drops,
    /// Additional reserve per owned object, in drops.
    pub reserve_increment_drops: Drops,
    /// Current load factor (numerator).
    pub load_factor: u64,
    /// Load factor denominator; `load_factor == load_base` means no load.
    pub load_base: u64,
    /// Transactions expected per ledger before escalation.
    pub expected_ledger_size: u32,
    /// Median fee of the last closed ledger, in drops.
    pub median_fee_drops: Drops,
    /// Minimum fee observed in the last closed ledger, in drops.
    pub minimum_fee_drops: Drops,
}

impl FeeSchedule {
    /// Base fee adjusted for current load, in drops. Never below one drop.
    pub fn current_base_fee(&self) -> Drops {
        let scaled = (self.base_fee_drops as u128 * self.load_factor as u128)
            / self.load_base.max(1) as u128;
        (scaled as Drops).max(1)
    }
}

/// Manages the global fee schedule and per-ledger load accounting.
#[derive(Debug, Clone)]
pub struct FeeModel {
    schedule: FeeSchedule,
    recent_fees: Vec<Drops>,
    txn_count_in_ledger: u32,
}

impl FeeModel {
    /// A fee model with the given network parameters.
    pub fn new(params: &LedgerParams) -> Self {
        Self {
            schedule: FeeSchedule {
                base_fee_drops: params.base_fee_drops,
                reserve_base_drops: params.reserve_base_drops,
                reserve_increment_drops: params.reserve_increment_drops,
                load_factor: params.load_base as u64,
                load_base: params.load_base as u64,
                expected_ledger_size: params.target_txn_count,
                median_fee_drops: params.base_fee_drops,
                minimum_fee_drops: params.base_fee_drops,
            },
            recent_fees: Vec::new(),
            txn_count_in_ledger: 0,
        }
    }

    /// The current schedule.
    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    // ── Reserve logic ───────────────────────────────────────────

    /// Minimum balance (in drops) an account with `owner_count` owned
    /// objects must maintain.
    pub fn account_reserve(&self, owner_count: u32) -> Drops {
        self.schedule.reserve_base_drops
            + self.schedule.reserve_increment_drops * owner_count as u64
    }

    /// The reserve increment charged per owned object.
    pub fn owner_reserve_increment(&self) -> Drops {
        self.schedule.reserve_increment_drops
    }

    // ── Fee validation ──────────────────────────────────────────

    /// Minimum fee in drops for the next transaction.
    pub fn minimum_fee(&self) -> Drops {
        self.schedule.current_base_fee()
    }

    /// Check that a submitted fee meets the minimum threshold.
    pub fn validate_fee(&self, fee_drops: Drops) -> Result<(), TransactionError> {
        let minimum = self.minimum_fee();
        if fee_drops < minimum {
            return Err(TransactionError::FeeBelowMinimum {
                fee: fee_drops,
                minimum,
            });
        }
        Ok(())
    }

    /// The fee level of a fee: `fee / base_fee`, scaled by 256.
    pub fn fee_level(&self, fee_drops: Drops) -> u64 {
        let base = self.schedule.base_fee_drops.max(1);
        fee_drops as u64 * FEE_LEVEL_SCALE / base
    }

    // ── Load factor ─────────────────────────────────────────────

    /// Record a transaction applied to the current open ledger.
    pub fn record_transaction(&mut self, fee_drops: Drops) {
        self.recent_fees.push(fee_drops);
        self.txn_count_in_ledger += 1;
    }

    /// Transactions applied to the current open ledger so far.
    pub fn open_ledger_count(&self) -> u32 {
        self.txn_count_in_ledger
    }

    /// Update fee levels from the just-closed ledger and reset per-ledger
    /// counters.
    pub fn on_ledger_close(&mut self) {
        if self.recent_fees.is_empty() {
            self.schedule.median_fee_drops = self.schedule.base_fee_drops;
            self.schedule.minimum_fee_drops = self.schedule.base_fee_drops;
        } else {
            let mut sorted = self.recent_fees.clone();
            sorted.sort_unstable();
            self.schedule.median_fee_drops = sorted[sorted.len() / 2];
            self.schedule.minimum_fee_drops = sorted[0];
        }

        let expected = self.schedule.expected_ledger_size.max(1) as u64;
        let applied = self.txn_count_in_ledger as u64;
        if applied > expected {
            self.schedule.load_factor = self.schedule.load_base * applied / expected;
        } else {
            self.schedule.load_factor = self.schedule.load_base;
        }

        self.recent_fees.clear();
        self.txn_count_in_ledger = 0;
    }
}
