// Path: crates/services/src/check.rs

//! Check management.
//!
//! Checks are deferred pull-payments: the sender authorizes a recipient to
//! cash up to `send_max` when ready. Either party can cancel an uncashed
//! check; anyone can cancel one that has expired.

use nexaflow_types::app::{Address, Amount};
use nexaflow_types::error::TransactionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single check on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEntry {
    /// Unique id (the creating transaction id).
    pub check_id: String,
    /// Creator and payer.
    pub account: Address,
    /// The authorized casher.
    pub destination: Address,
    /// Maximum value the sender authorizes.
    pub send_max: Amount,
    /// Expiration time; 0 = never.
    pub expiration: u64,
    /// Creation time.
    pub create_time: u64,
    /// Terminal: the check was cashed.
    pub cashed: bool,
    /// Terminal: the check was cancelled.
    pub cancelled: bool,
    /// Value actually cashed (zero until cashed).
    pub cashed_amount: Option<Amount>,
}

impl CheckEntry {
    /// Check whether this check can be cashed for `amount` (or `send_max`
    /// when `amount` is `None`), honouring `deliver_min`. The cashed amount
    /// is `min(requested, send_max)`.
    pub fn can_cash(
        &self,
        amount: Option<&Amount>,
        deliver_min: Option<&Amount>,
        now: u64,
    ) -> Result<Amount, TransactionError> {
        if self.cashed || self.cancelled {
            return Err(TransactionError::Precondition(
                "Check already resolved".into(),
            ));
        }
        if self.expiration > 0 && now >= self.expiration {
            return Err(TransactionError::Expired("Check has expired".into()));
        }

        let mut cash_amount = amount.cloned().unwrap_or_else(|| self.send_max.clone());
        if cash_amount.currency() != self.send_max.currency() {
            return Err(TransactionError::BadAmount(
                "Cash amount currency does not match the check".into(),
            ));
        }
        if value_of(&cash_amount) > value_of(&self.send_max) {
            cash_amount = self.send_max.clone();
        }
        if let Some(min) = deliver_min {
            if value_of(&cash_amount) < value_of(min) {
                return Err(TransactionError::Precondition(format!(
                    "Amount {} below deliver_min {}",
                    value_of(&cash_amount),
                    value_of(min)
                )));
            }
        }
        Ok(cash_amount)
    }

    /// Check whether `requester` may cancel this check now.
    pub fn can_cancel(&self, requester: &str, now: u64) -> Result<(), TransactionError> {
        if self.cashed || self.cancelled {
            return Err(TransactionError::Precondition(
                "Check already resolved".into(),
            ));
        }
        if requester == self.account || requester == self.destination {
            return Ok(());
        }
        if self.expiration > 0 && now >= self.expiration {
            return Ok(());
        }
        Err(TransactionError::NotAuthorized(
            "Only sender or destination can cancel".into(),
        ))
    }
}

fn value_of(amount: &Amount) -> Decimal {
    match amount {
        Amount::Drops(d) => Decimal::from(*d),
        Amount::Issued { value, .. } => *value,
    }
}

/// Manages all checks on the ledger.
#[derive(Debug, Clone, Default)]
pub struct CheckManager {
    /// All checks, keyed by id.
    pub checks: BTreeMap<String, CheckEntry>,
}

impl CheckManager {
    /// Create and store a new check.
    pub fn create_check(
        &mut self,
        check_id: &str,
        account: &str,
        destination: &str,
        send_max: Amount,
        expiration: u64,
        now: u64,
    ) -> Result<&CheckEntry, TransactionError> {
        if send_max.is_zero() {
            return Err(TransactionError::BadAmount(
                "send_max must be positive".into(),
            ));
        }
        let entry = CheckEntry {
            check_id: check_id.to_owned(),
            account: account.to_owned(),
            destination: destination.to_owned(),
            send_max,
            expiration,
            create_time: now,
            cashed: false,
            cancelled: false,
            cashed_amount: None,
        };
        self.checks.insert(check_id.to_owned(), entry);
        Ok(&self.checks[check_id])
    }

    /// Cash a check. Returns the entry and the cashed amount.
    pub fn cash_check(
        &mut self,
        check_id: &str,
        amount: Option<&Amount>,
        deliver_min: Option<&Amount>,
        now: u64,
    ) -> Result<(&CheckEntry, Amount), TransactionError> {
        let entry = self
            .checks
            .get_mut(check_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Check {}", check_id)))?;
        let cash_amount = entry.can_cash(amount, deliver_min, now)?;
        entry.cashed = true;
        entry.cashed_amount = Some(cash_amount.clone());
        log::info!("check {} cashed by {}", check_id, entry.destination);
        Ok((&*entry, cash_amount))
    }

    /// Cancel a check.
    pub fn cancel_check(
        &mut self,
        check_id: &str,
        requester: &str,
        now: u64,
    ) -> Result<&CheckEntry, TransactionError> {
        let entry = self
            .checks
            .get_mut(check_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Check {}", check_id)))?;
        entry.can_cancel(requester, now)?;
        entry.cancelled = true;
        Ok(entry)
    }

    /// Look up a check by id.
    pub fn get_check(&self, check_id: &str) -> Option<&CheckEntry> {
        self.checks.get(check_id)
    }

    /// Unresolved checks where the account is a party.
    pub fn get_checks_for_account(&self, account: &str) -> Vec<&CheckEntry> {
        self.checks
            .values()
            .filter(|c| {
                (c.account == account || c.destination == account) && !c.cashed && !c.cancelled
            })
            .collect()
    }

    /// Count of unresolved checks.
    pub fn pending_count(&self) -> usize {
        self.checks
            .values()
            .filter(|c| !c.cashed && !c.cancelled)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native(drops: u64) -> Amount {
        Amount::Drops(drops)
    }

    #[test]
    fn cash_defaults_to_send_max() {
        let mut mgr = CheckManager::default();
        mgr.create_check("c1", "alice", "bob", native(100), 0, 0)
            .unwrap();
        let (entry, cashed) = mgr.cash_check("c1", None, None, 10).unwrap();
        assert_eq!(cashed, native(100));
        assert!(entry.cashed);
    }

    #[test]
    fn cash_amount_clamped_by_send_max() {
        let mut mgr = CheckManager::default();
        mgr.create_check("c1", "alice", "bob", native(100), 0, 0)
            .unwrap();
        // Requesting more than authorized cashes exactly send_max.
        let (entry, cashed) = mgr
            .cash_check("c1", Some(&native(150)), None, 10)
            .unwrap();
        assert_eq!(cashed, native(100));
        assert_eq!(entry.cashed_amount, Some(native(100)));
    }

    #[test]
    fn deliver_min_enforced() {
        let mut mgr = CheckManager::default();
        mgr.create_check("c1", "alice", "bob", native(100), 0, 0)
            .unwrap();
        let err = mgr
            .cash_check("c1", Some(&native(40)), Some(&native(50)), 10)
            .unwrap_err();
        assert!(err.to_string().contains("below deliver_min"));

        // deliver_min equal to the cashed amount passes.
        let (_, cashed) = mgr
            .cash_check("c1", Some(&native(50)), Some(&native(50)), 10)
            .unwrap();
        assert_eq!(cashed, native(50));
    }

    #[test]
    fn expired_check_cannot_cash_but_anyone_cancels() {
        let mut mgr = CheckManager::default();
        mgr.create_check("c1", "alice", "bob", native(100), 500, 0)
            .unwrap();
        assert!(matches!(
            mgr.cash_check("c1", None, None, 500).unwrap_err(),
            TransactionError::Expired(_)
        ));
        // A third party may cancel once expired.
        let entry = mgr.cancel_check("c1", "mallory", 500).unwrap();
        assert!(entry.cancelled);
    }

    #[test]
    fn only_parties_cancel_before_expiry() {
        let mut mgr = CheckManager::default();
        mgr.create_check("c1", "alice", "bob", native(100), 500, 0)
            .unwrap();
        assert!(mgr.cancel_check("c1", "mallory", 10).is_err());
        assert!(mgr.cancel_check("c1", "bob", 10).is_ok());
    }

    #[test]
    fn cashed_and_cancelled_are_terminal() {
        let mut mgr = CheckManager::default();
        mgr.create_check("c1", "alice", "bob", native(100), 0, 0)
            .unwrap();
        mgr.cash_check("c1", None, None, 1).unwrap();
        assert!(mgr.cancel_check("c1", "alice", 2).is_err());
        assert!(mgr.cash_check("c1", None, None, 3).is_err());
    }
}
