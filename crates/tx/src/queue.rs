// Path: crates/tx/src/queue.rs

//! Open-ledger fee escalation and the transaction queue.
//!
//! Inclusion in the open ledger costs the base fee until the ledger holds
//! more than `target_txn_count` transactions; past the target the cost
//! escalates quadratically:
//!
//! ```text
//! open_ledger_cost = base_fee · (count / target)²
//! ```
//!
//! Transactions that cannot afford the open-ledger cost but at least pay the
//! base fee wait in a bounded queue ordered by fee level. On every ledger
//! close the queue drains in fee-descending order, expired and over-retried
//! entries are dropped, and the remainder is re-queued with an incremented
//! retry count.

use crate::fees::FeeModel;
use nexaflow_types::app::{Address, Drops};
use nexaflow_types::config::LedgerParams;
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};

/// A transaction waiting in the fee queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTransaction {
    /// The transaction id.
    pub tx_id: String,
    /// The sending account.
    pub account: Address,
    /// Fee offered, in drops.
    pub fee: Drops,
    /// Priority key: `fee / reference_cost`, scaled by 256.
    pub fee_level: u64,
    /// The transaction's sequence number.
    pub sequence: u32,
    /// When the transaction entered the queue (seconds).
    pub submitted_at: u64,
    /// How many ledger closes this entry has survived.
    pub retries: u32,
    arrival: u64,
}

/// The outcome of submitting a transaction to the fee engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The fee affords the open ledger; apply immediately.
    Applied,
    /// Held in the queue at the given position (0 = next out).
    Queued(usize),
    /// Rejected outright; no fee is charged.
    Rejected(TransactionError),
}

/// Dynamic fee escalation and the bounded transaction queue.
#[derive(Debug, Clone)]
pub struct FeeEscalation {
    base_fee: Drops,
    target_txn_count: u32,
    max_txn_count: u32,
    max_queue_size: usize,
    queue_max_age_secs: u64,
    queue_max_retries: u32,
    /// Sorted by fee level descending, arrival ascending.
    queue: Vec<QueuedTransaction>,
    current_ledger_count: u32,
    next_arrival: u64,
}

impl FeeEscalation {
    /// An escalation engine with the given network parameters.
    pub fn new(params: &LedgerParams) -> Self {
        Self {
            base_fee: params.base_fee_drops,
            target_txn_count: params.target_txn_count,
            max_txn_count: params.max_txn_count,
            max_queue_size: params.max_queue_size,
            queue_max_age_secs: params.queue_max_age_secs,
            queue_max_retries: params.queue_max_retries,
            queue: Vec::new(),
            current_ledger_count: 0,
            next_arrival: 0,
        }
    }

    /// Number of queued transactions.
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Transactions accepted into the current open ledger.
    pub fn current_ledger_count(&self) -> u32 {
        self.current_ledger_count
    }

    /// The current cost of immediate inclusion, in drops.
    pub fn open_ledger_cost(&self) -> Drops {
        let count = self.current_ledger_count as u128;
        let target = self.target_txn_count.max(1) as u128;
        if count <= target {
            return self.base_fee;
        }
        (self.base_fee as u128 * count * count / (target * target)) as Drops
    }

    /// Whether a fee affords immediate inclusion right now.
    pub fn can_include_in_ledger(&self, fee: Drops) -> bool {
        if self.current_ledger_count >= self.max_txn_count {
            return false;
        }
        fee >= self.open_ledger_cost()
    }

    /// Submit a transaction: apply immediately, queue, or reject.
    pub fn submit(
        &mut self,
        tx_id: &str,
        account: &str,
        sequence: u32,
        fee: Drops,
        now: u64,
        fees: &FeeModel,
    ) -> SubmitOutcome {
        if fee < self.base_fee {
            return SubmitOutcome::Rejected(TransactionError::FeeBelowMinimum {
                fee,
                minimum: self.base_fee,
            });
        }

        if self.can_include_in_ledger(fee) {
            self.current_ledger_count += 1;
            return SubmitOutcome::Applied;
        }

        if self.queue.len() >= self.max_queue_size {
            // A full queue only admits fees that displace the lowest entry.
            let displaces = self
                .queue
                .last()
                .map(|lowest| fee > lowest.fee)
                .unwrap_or(false);
            if displaces {
                self.queue.pop();
            } else {
                return SubmitOutcome::Rejected(TransactionError::QueueFull);
            }
        }

        let entry = QueuedTransaction {
            tx_id: tx_id.to_owned(),
            account: account.to_owned(),
            fee,
            fee_level: fees.fee_level(fee),
            sequence,
            submitted_at: now,
            retries: 0,
            arrival: self.next_arrival,
        };
        self.next_arrival += 1;

        let position = self
            .queue
            .partition_point(|q| (q.fee_level, std::cmp::Reverse(q.arrival)) >= (entry.fee_level, std::cmp::Reverse(entry.arrival)));
        self.queue.insert(position, entry);
        SubmitOutcome::Queued(position)
    }

    /// Ledger close: reset the open-ledger count, drop expired and
    /// over-retried entries, and drain the highest-fee transactions for the
    /// next ledger (fee-descending). The remainder is re-queued with an
    /// incremented retry count.
    pub fn on_ledger_close(&mut self, now: u64) -> Vec<QueuedTransaction> {
        self.current_ledger_count = 0;

        let max_age = self.queue_max_age_secs;
        let max_retries = self.queue_max_retries;
        let before = self.queue.len();
        self.queue
            .retain(|q| now.saturating_sub(q.submitted_at) <= max_age && q.retries < max_retries);
        let dropped = before - self.queue.len();
        if dropped > 0 {
            log::debug!("fee queue dropped {} expired entries at close", dropped);
        }

        let take = (self.target_txn_count as usize).min(self.queue.len());
        let drained: Vec<QueuedTransaction> = self.queue.drain(..take).collect();
        for waiting in &mut self.queue {
            waiting.retries += 1;
        }
        drained
    }
}
