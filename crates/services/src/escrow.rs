// Path: crates/services/src/escrow.rs

//! Escrow management.
//!
//! Escrows lock drops on the ledger and release them when a time condition
//! (`finish_after`) is met and/or a SHA-256 crypto-condition fulfillment is
//! presented, or return them to the creator after `cancel_after`.

use nexaflow_crypto::sha256_hex;
use nexaflow_types::app::{Address, Drops};
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single escrow held on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEntry {
    /// Unique id (the creating transaction id).
    pub escrow_id: String,
    /// Creator and funder.
    pub account: Address,
    /// Recipient when finished.
    pub destination: Address,
    /// Drops locked.
    pub amount: Drops,
    /// SHA-256 hash (hex) of the fulfillment; empty = no condition.
    pub condition: String,
    /// Earliest finish time (seconds); 0 = immediately finishable.
    pub finish_after: u64,
    /// Time after which the escrow can be cancelled; 0 = never.
    pub cancel_after: u64,
    /// Creation time.
    pub create_time: u64,
    /// Terminal: funds delivered to the destination.
    pub finished: bool,
    /// Terminal: funds returned to the creator.
    pub cancelled: bool,
}

impl EscrowEntry {
    /// Check whether the escrow can be finished now with the given
    /// fulfillment.
    pub fn can_finish(&self, fulfillment: &str, now: u64) -> Result<(), TransactionError> {
        if self.finished || self.cancelled {
            return Err(TransactionError::Precondition(
                "Escrow already resolved".into(),
            ));
        }
        if self.finish_after > 0 && now < self.finish_after {
            return Err(TransactionError::Precondition(format!(
                "Cannot finish before {}",
                self.finish_after
            )));
        }
        if self.cancel_after > 0 && now >= self.cancel_after {
            return Err(TransactionError::Expired(
                "Escrow has expired (past cancel_after)".into(),
            ));
        }
        if !self.condition.is_empty() {
            if fulfillment.is_empty() {
                return Err(TransactionError::Precondition(
                    "Condition requires fulfillment".into(),
                ));
            }
            let computed = sha256_hex(fulfillment.as_bytes());
            if computed != self.condition {
                return Err(TransactionError::Precondition(
                    "Fulfillment does not match condition".into(),
                ));
            }
        }
        Ok(())
    }

    /// Check whether the escrow can be cancelled now.
    pub fn can_cancel(&self, now: u64) -> Result<(), TransactionError> {
        if self.finished || self.cancelled {
            return Err(TransactionError::Precondition(
                "Escrow already resolved".into(),
            ));
        }
        if self.cancel_after == 0 {
            return Err(TransactionError::Precondition(
                "Escrow has no cancel_after and cannot be cancelled".into(),
            ));
        }
        if now < self.cancel_after {
            return Err(TransactionError::Precondition(format!(
                "Cannot cancel before {}",
                self.cancel_after
            )));
        }
        Ok(())
    }
}

/// Manages all escrows on the ledger.
#[derive(Debug, Clone, Default)]
pub struct EscrowManager {
    /// All escrows, keyed by id.
    pub escrows: BTreeMap<String, EscrowEntry>,
}

impl EscrowManager {
    /// Create and store a new escrow.
    #[allow(clippy::too_many_arguments)]
    pub fn create_escrow(
        &mut self,
        escrow_id: &str,
        account: &str,
        destination: &str,
        amount: Drops,
        condition: &str,
        finish_after: u64,
        cancel_after: u64,
        now: u64,
    ) -> Result<&EscrowEntry, TransactionError> {
        if cancel_after > 0 && finish_after > 0 && finish_after >= cancel_after {
            return Err(TransactionError::Malformed(
                "finish_after must be before cancel_after".into(),
            ));
        }
        let entry = EscrowEntry {
            escrow_id: escrow_id.to_owned(),
            account: account.to_owned(),
            destination: destination.to_owned(),
            amount,
            condition: condition.to_owned(),
            finish_after,
            cancel_after,
            create_time: now,
            finished: false,
            cancelled: false,
        };
        log::debug!("escrow {} created: {} drops locked", escrow_id, amount);
        self.escrows.insert(escrow_id.to_owned(), entry);
        Ok(&self.escrows[escrow_id])
    }

    /// Finish an escrow, delivering the locked amount to the destination.
    pub fn finish_escrow(
        &mut self,
        escrow_id: &str,
        fulfillment: &str,
        now: u64,
    ) -> Result<&EscrowEntry, TransactionError> {
        let entry = self
            .escrows
            .get_mut(escrow_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Escrow {}", escrow_id)))?;
        entry.can_finish(fulfillment, now)?;
        entry.finished = true;
        log::info!("escrow {} finished for {}", escrow_id, entry.destination);
        Ok(entry)
    }

    /// Cancel an escrow, returning the locked amount to the creator. Only
    /// the creator may cancel.
    pub fn cancel_escrow(
        &mut self,
        escrow_id: &str,
        account: &str,
        now: u64,
    ) -> Result<&EscrowEntry, TransactionError> {
        let entry = self
            .escrows
            .get_mut(escrow_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Escrow {}", escrow_id)))?;
        if entry.account != account {
            return Err(TransactionError::NotAuthorized(
                "Only the escrow creator can cancel".into(),
            ));
        }
        entry.can_cancel(now)?;
        entry.cancelled = true;
        log::info!("escrow {} cancelled by {}", escrow_id, account);
        Ok(entry)
    }

    /// Look up an escrow by id.
    pub fn get_escrow(&self, escrow_id: &str) -> Option<&EscrowEntry> {
        self.escrows.get(escrow_id)
    }

    /// Active escrows created by an account.
    pub fn get_escrows_for_account(&self, account: &str) -> Vec<&EscrowEntry> {
        self.escrows
            .values()
            .filter(|e| e.account == account && !e.finished && !e.cancelled)
            .collect()
    }

    /// Count of unresolved escrows.
    pub fn pending_count(&self) -> usize {
        self.escrows
            .values()
            .filter(|e| !e.finished && !e.cancelled)
            .count()
    }

    /// Total drops locked in unresolved escrows.
    pub fn total_locked(&self) -> Drops {
        self.escrows
            .values()
            .filter(|e| !e.finished && !e.cancelled)
            .map(|e| e.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexaflow_crypto::sha256_hex;

    fn manager_with_conditional_escrow() -> EscrowManager {
        let mut mgr = EscrowManager::default();
        let condition = sha256_hex(b"payment-proof");
        mgr.create_escrow("e1", "alice", "bob", 100_000_000, &condition, 1000, 0, 0)
            .unwrap();
        mgr
    }

    #[test]
    fn finish_before_finish_after_is_rejected() {
        let mut mgr = manager_with_conditional_escrow();
        let err = mgr.finish_escrow("e1", "payment-proof", 500).unwrap_err();
        assert_eq!(err.to_string(), "Cannot finish before 1000");
    }

    #[test]
    fn finish_with_wrong_fulfillment_is_rejected() {
        let mut mgr = manager_with_conditional_escrow();
        let err = mgr.finish_escrow("e1", "wrong-secret", 1001).unwrap_err();
        assert_eq!(err.to_string(), "Fulfillment does not match condition");
    }

    #[test]
    fn finish_at_boundary_with_correct_fulfillment() {
        let mut mgr = manager_with_conditional_escrow();
        // finish_after - 1 rejected, finish_after accepted.
        assert!(mgr.finish_escrow("e1", "payment-proof", 999).is_err());
        let entry = mgr.finish_escrow("e1", "payment-proof", 1000).unwrap();
        assert!(entry.finished);
    }

    #[test]
    fn finish_is_terminal() {
        let mut mgr = manager_with_conditional_escrow();
        mgr.finish_escrow("e1", "payment-proof", 1001).unwrap();
        let err = mgr.finish_escrow("e1", "payment-proof", 1002).unwrap_err();
        assert_eq!(err.to_string(), "Escrow already resolved");
    }

    #[test]
    fn cancel_rules() {
        let mut mgr = EscrowManager::default();
        mgr.create_escrow("e2", "alice", "bob", 50, "", 0, 2000, 0)
            .unwrap();

        // Only the creator, and only after cancel_after.
        assert!(mgr.cancel_escrow("e2", "bob", 2001).is_err());
        assert!(mgr.cancel_escrow("e2", "alice", 1999).is_err());
        let entry = mgr.cancel_escrow("e2", "alice", 2000).unwrap();
        assert!(entry.cancelled);
    }

    #[test]
    fn expired_escrow_cannot_finish() {
        let mut mgr = EscrowManager::default();
        mgr.create_escrow("e3", "alice", "bob", 50, "", 100, 200, 0)
            .unwrap();
        let err = mgr.finish_escrow("e3", "", 200).unwrap_err();
        assert!(matches!(err, TransactionError::Expired(_)));
    }

    #[test]
    fn timing_coherence_enforced_at_create() {
        let mut mgr = EscrowManager::default();
        let err = mgr
            .create_escrow("bad", "alice", "bob", 50, "", 300, 200, 0)
            .unwrap_err();
        assert!(matches!(err, TransactionError::Malformed(_)));
    }

    #[test]
    fn total_locked_excludes_resolved() {
        let mut mgr = EscrowManager::default();
        mgr.create_escrow("a", "alice", "bob", 100, "", 0, 0, 0)
            .unwrap();
        mgr.create_escrow("b", "alice", "bob", 200, "", 0, 0, 0)
            .unwrap();
        assert_eq!(mgr.total_locked(), 300);
        mgr.finish_escrow("a", "", 10).unwrap();
        assert_eq!(mgr.total_locked(), 200);
        assert_eq!(mgr.pending_count(), 1);
    }
}
