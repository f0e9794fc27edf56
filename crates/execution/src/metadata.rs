// Path: crates/execution/src/metadata.rs

//! Transaction metadata: the canonical record of everything a transaction
//! touched.
//!
//! The builder collects affected nodes (created, modified, deleted) and
//! per-account balance deltas while a transaction applies, then produces a
//! `TransactionMetadata` stored alongside the transaction for audit and
//! replay.

use nexaflow_types::app::{AccountRoot, Address, Amount, Drops, ResultCode, NATIVE_CURRENCY};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// How a transaction affected a ledger node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAction {
    /// The node was created.
    #[serde(rename = "CreatedNode")]
    Created,
    /// The node existed and changed.
    #[serde(rename = "ModifiedNode")]
    Modified,
    /// The node was removed.
    #[serde(rename = "DeletedNode")]
    Deleted,
}

/// A single ledger entry changed by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedNode {
    /// Created, modified or deleted.
    pub action: NodeAction,
    /// The entry type, e.g. `"AccountRoot"`, `"Escrow"`, `"TrustLine"`.
    pub ledger_entry_type: String,
    /// The entry's identifying index.
    pub ledger_index: String,
    /// Pre-transaction values of changed fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub previous_fields: BTreeMap<String, Value>,
    /// Post-transaction values of changed fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub final_fields: BTreeMap<String, Value>,
    /// Fields of a newly created node.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub new_fields: BTreeMap<String, Value>,
}

/// A native balance change for a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// The affected account.
    pub account: Address,
    /// Currency of the change (native here).
    pub currency: String,
    /// Issuer; empty for native.
    pub issuer: Address,
    /// Balance before the transaction, in drops.
    pub previous_balance: Drops,
    /// Balance after the transaction, in drops.
    pub final_balance: Drops,
}

impl BalanceChange {
    /// The signed delta in drops.
    pub fn delta(&self) -> i128 {
        self.final_balance as i128 - self.previous_balance as i128
    }
}

/// The full metadata record of one applied (or failed) transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    /// The transaction id.
    pub tx_hash: String,
    /// Position within the closed ledger's canonical order.
    pub tx_index: u32,
    /// The stable result code.
    pub result_code: i32,
    /// The result code's canonical name.
    pub result_name: String,
    /// Every node the transaction touched.
    pub affected_nodes: Vec<AffectedNode>,
    /// Per-account native balance deltas.
    pub balance_changes: Vec<BalanceChange>,
    /// The amount actually delivered, when the transaction delivered value.
    pub delivered_amount: Option<Amount>,
}

#[derive(Debug, Clone, Copy)]
struct AccountSnapshot {
    balance: Drops,
    sequence: u32,
    owner_count: u32,
}

/// Collects state changes during transaction application and produces the
/// final [`TransactionMetadata`].
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    tx_hash: String,
    tx_index: u32,
    nodes: Vec<AffectedNode>,
    balance_changes: Vec<BalanceChange>,
    delivered_amount: Option<Amount>,
    result_code: i32,
    result_name: String,
    snapshots: BTreeMap<Address, AccountSnapshot>,
}

impl MetadataBuilder {
    /// A builder for the given transaction.
    pub fn new(tx_hash: &str, tx_index: u32) -> Self {
        Self {
            tx_hash: tx_hash.to_owned(),
            tx_index,
            ..Self::default()
        }
    }

    /// Record the pre-transaction state of an account.
    pub fn snapshot_account(&mut self, account: &AccountRoot) {
        self.snapshots.insert(
            account.address.clone(),
            AccountSnapshot {
                balance: account.balance,
                sequence: account.sequence,
                owner_count: account.owner_count,
            },
        );
    }

    /// Whether an account was snapshotted before application.
    pub fn has_snapshot(&self, address: &str) -> bool {
        self.snapshots.contains_key(address)
    }

    /// Every address snapshotted so far.
    pub fn snapshot_addresses(&self) -> Vec<Address> {
        self.snapshots.keys().cloned().collect()
    }

    /// Record an account whose fields changed since its snapshot. Emits a
    /// `ModifiedNode` and a balance change when anything differs.
    pub fn record_account_modify(&mut self, account: &AccountRoot) {
        let Some(prev) = self.snapshots.get(&account.address).copied() else {
            return;
        };
        let mut previous_fields = BTreeMap::new();
        let mut final_fields = BTreeMap::new();

        if prev.balance != account.balance {
            previous_fields.insert("Balance".to_owned(), json!(prev.balance));
            final_fields.insert("Balance".to_owned(), json!(account.balance));
            self.balance_changes.push(BalanceChange {
                account: account.address.clone(),
                currency: NATIVE_CURRENCY.to_owned(),
                issuer: String::new(),
                previous_balance: prev.balance,
                final_balance: account.balance,
            });
        }
        if prev.sequence != account.sequence {
            previous_fields.insert("Sequence".to_owned(), json!(prev.sequence));
            final_fields.insert("Sequence".to_owned(), json!(account.sequence));
        }
        if prev.owner_count != account.owner_count {
            previous_fields.insert("OwnerCount".to_owned(), json!(prev.owner_count));
            final_fields.insert("OwnerCount".to_owned(), json!(account.owner_count));
        }

        if !previous_fields.is_empty() {
            self.nodes.push(AffectedNode {
                action: NodeAction::Modified,
                ledger_entry_type: "AccountRoot".to_owned(),
                ledger_index: account.address.clone(),
                previous_fields,
                final_fields,
                new_fields: BTreeMap::new(),
            });
        }
    }

    /// Record a newly created account.
    pub fn record_account_create(&mut self, account: &AccountRoot) {
        let mut new_fields = BTreeMap::new();
        new_fields.insert("Balance".to_owned(), json!(account.balance));
        new_fields.insert("Sequence".to_owned(), json!(account.sequence));
        self.nodes.push(AffectedNode {
            action: NodeAction::Created,
            ledger_entry_type: "AccountRoot".to_owned(),
            ledger_index: account.address.clone(),
            previous_fields: BTreeMap::new(),
            final_fields: BTreeMap::new(),
            new_fields,
        });
    }

    /// Record a deleted account.
    pub fn record_account_delete(&mut self, address: &str, prev_balance: Drops) {
        let mut previous_fields = BTreeMap::new();
        previous_fields.insert("Balance".to_owned(), json!(prev_balance));
        self.nodes.push(AffectedNode {
            action: NodeAction::Deleted,
            ledger_entry_type: "AccountRoot".to_owned(),
            ledger_index: address.to_owned(),
            previous_fields,
            final_fields: BTreeMap::new(),
            new_fields: BTreeMap::new(),
        });
    }

    /// Record a created node of any entry type.
    pub fn record_created(
        &mut self,
        entry_type: &str,
        index: &str,
        new_fields: BTreeMap<String, Value>,
    ) {
        self.nodes.push(AffectedNode {
            action: NodeAction::Created,
            ledger_entry_type: entry_type.to_owned(),
            ledger_index: index.to_owned(),
            previous_fields: BTreeMap::new(),
            final_fields: BTreeMap::new(),
            new_fields,
        });
    }

    /// Record a modified node of any entry type.
    pub fn record_modified(
        &mut self,
        entry_type: &str,
        index: &str,
        previous_fields: BTreeMap<String, Value>,
        final_fields: BTreeMap<String, Value>,
    ) {
        self.nodes.push(AffectedNode {
            action: NodeAction::Modified,
            ledger_entry_type: entry_type.to_owned(),
            ledger_index: index.to_owned(),
            previous_fields,
            final_fields,
            new_fields: BTreeMap::new(),
        });
    }

    /// Record a deleted node of any entry type.
    pub fn record_deleted(
        &mut self,
        entry_type: &str,
        index: &str,
        previous_fields: BTreeMap<String, Value>,
    ) {
        self.nodes.push(AffectedNode {
            action: NodeAction::Deleted,
            ledger_entry_type: entry_type.to_owned(),
            ledger_index: index.to_owned(),
            previous_fields,
            final_fields: BTreeMap::new(),
            new_fields: BTreeMap::new(),
        });
    }

    /// Set the delivered amount.
    pub fn set_delivered_amount(&mut self, amount: Amount) {
        self.delivered_amount = Some(amount);
    }

    /// Set the transaction result.
    pub fn set_result(&mut self, code: ResultCode) {
        self.result_code = code as i32;
        self.result_name = code.name().to_owned();
    }

    /// Discard every recorded node and balance change, keeping the account
    /// snapshots. Used when a transaction rolls back.
    pub fn discard_changes(&mut self) {
        self.nodes.clear();
        self.balance_changes.clear();
        self.delivered_amount = None;
    }

    /// Produce the final metadata record.
    pub fn build(self) -> TransactionMetadata {
        TransactionMetadata {
            tx_hash: self.tx_hash,
            tx_index: self.tx_index,
            result_code: self.result_code,
            result_name: self.result_name,
            affected_nodes: self.nodes,
            balance_changes: self.balance_changes,
            delivered_amount: self.delivered_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modify_emits_deltas_for_changed_fields_only() {
        let mut account = AccountRoot::new("alice", 500_000_000);
        let mut builder = MetadataBuilder::new("tx1", 0);
        builder.snapshot_account(&account);

        account.balance = 449_999_990;
        account.sequence = 2;
        builder.record_account_modify(&account);
        builder.set_result(ResultCode::TesSuccess);

        let meta = builder.build();
        assert_eq!(meta.result_name, "tesSUCCESS");
        assert_eq!(meta.affected_nodes.len(), 1);
        let node = &meta.affected_nodes[0];
        assert_eq!(node.action, NodeAction::Modified);
        assert!(node.previous_fields.contains_key("Balance"));
        assert!(node.previous_fields.contains_key("Sequence"));
        assert!(!node.previous_fields.contains_key("OwnerCount"));

        assert_eq!(meta.balance_changes.len(), 1);
        assert_eq!(meta.balance_changes[0].delta(), -50_000_010);
    }

    #[test]
    fn unchanged_account_records_nothing() {
        let account = AccountRoot::new("alice", 100);
        let mut builder = MetadataBuilder::new("tx1", 0);
        builder.snapshot_account(&account);
        builder.record_account_modify(&account);
        assert!(builder.build().affected_nodes.is_empty());
    }

    #[test]
    fn discard_keeps_snapshots_for_fee_only_record() {
        let mut account = AccountRoot::new("alice", 100);
        let mut builder = MetadataBuilder::new("tx1", 0);
        builder.snapshot_account(&account);
        builder.record_created("Escrow", "e1", BTreeMap::new());

        builder.discard_changes();
        assert!(builder.has_snapshot("alice"));

        account.balance = 90;
        builder.record_account_modify(&account);
        let meta = builder.build();
        assert_eq!(meta.affected_nodes.len(), 1);
        assert_eq!(meta.affected_nodes[0].ledger_entry_type, "AccountRoot");
    }

    #[test]
    fn node_actions_serialize_with_canonical_names() {
        let serialized = serde_json::to_string(&NodeAction::Created).unwrap();
        assert_eq!(serialized, "\"CreatedNode\"");
    }
}
