// Path: crates/services/src/staking.rs

//! The staking pool.
//!
//! Accounts lock drops into the pool with `stake` and release them with
//! `unstake`. The pool total always equals the sum of active stake
//! amounts, which the invariant checker verifies after every transaction.

use nexaflow_types::app::{Address, Drops};
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One account's stake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEntry {
    /// The staking account.
    pub account: Address,
    /// Drops staked.
    pub amount: Drops,
    /// False once fully unstaked.
    pub is_active: bool,
    /// When the stake was first placed.
    pub staked_at: u64,
}

/// The global staking pool.
#[derive(Debug, Clone)]
pub struct StakePool {
    /// All stakes, keyed by account.
    pub stakes: BTreeMap<Address, StakeEntry>,
    /// Total drops staked across active entries.
    pub total_staked: Drops,
    min_stake: Drops,
}

impl StakePool {
    /// A pool with the given minimum stake in drops.
    pub fn new(min_stake: Drops) -> Self {
        Self {
            stakes: BTreeMap::new(),
            total_staked: 0,
            min_stake,
        }
    }

    /// The minimum stake in drops.
    pub fn min_stake(&self) -> Drops {
        self.min_stake
    }

    /// Add to an account's stake. Rejects amounts below the minimum for a
    /// new stake; exactly the minimum is accepted.
    pub fn stake(&mut self, account: &str, amount: Drops, now: u64) -> Result<(), TransactionError> {
        let existing = self.stakes.get(account).filter(|s| s.is_active);
        if existing.is_none() && amount < self.min_stake {
            return Err(TransactionError::Unfunded(format!(
                "Stake {} below minimum {}",
                amount, self.min_stake
            )));
        }
        match self.stakes.get_mut(account) {
            Some(entry) if entry.is_active => entry.amount += amount,
            _ => {
                self.stakes.insert(
                    account.to_owned(),
                    StakeEntry {
                        account: account.to_owned(),
                        amount,
                        is_active: true,
                        staked_at: now,
                    },
                );
            }
        }
        self.total_staked += amount;
        log::info!("{} staked {} drops", account, amount);
        Ok(())
    }

    /// Release up to `amount` drops of an account's stake. Returns the
    /// drops actually released.
    pub fn unstake(&mut self, account: &str, amount: Drops) -> Result<Drops, TransactionError> {
        let entry = self
            .stakes
            .get_mut(account)
            .filter(|s| s.is_active)
            .ok_or_else(|| TransactionError::Precondition("No active stake".into()))?;
        if amount > entry.amount {
            return Err(TransactionError::Unfunded(format!(
                "Unstake {} exceeds staked {}",
                amount, entry.amount
            )));
        }
        entry.amount -= amount;
        if entry.amount == 0 {
            entry.is_active = false;
        }
        self.total_staked -= amount;
        Ok(amount)
    }

    /// The active stake of an account.
    pub fn stake_of(&self, account: &str) -> Drops {
        self.stakes
            .get(account)
            .filter(|s| s.is_active)
            .map(|s| s.amount)
            .unwrap_or(0)
    }

    /// The sum of active stake amounts (always equals `total_staked`).
    pub fn active_stake_sum(&self) -> Drops {
        self.stakes
            .values()
            .filter(|s| s.is_active)
            .map(|s| s.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stake_below_minimum_rejected_at_minimum_accepted() {
        let mut pool = StakePool::new(10_000_000);
        let err = pool.stake("alice", 9_999_999, 0).unwrap_err();
        assert!(matches!(err, TransactionError::Unfunded(_)));
        pool.stake("alice", 10_000_000, 0).unwrap();
        assert_eq!(pool.stake_of("alice"), 10_000_000);
    }

    #[test]
    fn top_up_below_minimum_allowed_once_active() {
        let mut pool = StakePool::new(10_000_000);
        pool.stake("alice", 10_000_000, 0).unwrap();
        pool.stake("alice", 5, 1).unwrap();
        assert_eq!(pool.stake_of("alice"), 10_000_005);
    }

    #[test]
    fn unstake_caps_at_staked_and_deactivates_at_zero() {
        let mut pool = StakePool::new(100);
        pool.stake("alice", 100, 0).unwrap();
        assert!(pool.unstake("alice", 101).is_err());
        assert_eq!(pool.unstake("alice", 100).unwrap(), 100);
        assert_eq!(pool.stake_of("alice"), 0);
        assert!(pool.unstake("alice", 1).is_err());
    }

    #[test]
    fn pool_total_matches_active_sum() {
        let mut pool = StakePool::new(100);
        pool.stake("alice", 100, 0).unwrap();
        pool.stake("bob", 300, 0).unwrap();
        pool.unstake("bob", 50).unwrap();
        assert_eq!(pool.total_staked, 350);
        assert_eq!(pool.total_staked, pool.active_stake_sum());
    }
}
