// Path: crates/services/src/hooks.rs

//! Hooks: per-account transaction-triggered logic.
//!
//! An account installs up to four hooks, each referencing a registered
//! definition (code + namespace + parameters + tx-type bitmask). Hooks run
//! before or after a transaction on the hooked account, may read and write
//! a bounded per-(account, hook) state slot, may emit a bounded number of
//! synthetic transactions, and return accept, reject, or rollback. Any
//! reject or rollback fails the transaction; the execution is still
//! recorded.
//!
//! Handlers are in-process callables standing in for a metered sandbox;
//! the accept/reject/rollback contract and the bounded state slot are the
//! stable surface.

use nexaflow_crypto::sha256;
use nexaflow_types::app::{Address, Transaction};
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Maximum hooks per account.
pub const MAX_HOOKS_PER_ACCOUNT: usize = 4;
/// Maximum state entries per (account, hook).
pub const MAX_STATE_ENTRIES: usize = 256;
/// Maximum state key length in bytes.
pub const MAX_STATE_KEY_LEN: usize = 32;
/// Maximum state value length in bytes.
pub const MAX_STATE_VALUE_LEN: usize = 256;
/// Maximum synthetic transactions a hook may emit per execution.
pub const MAX_EMITTED_TXNS: usize = 3;
/// A `hook_on` mask firing on every transaction type.
pub const HOOK_ON_ALL: u128 = u128::MAX;

/// The verdict a hook returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookVerdict {
    /// Let the transaction proceed.
    Accept,
    /// Fail the transaction.
    Reject,
    /// Fail the transaction and discard any partial effects.
    Rollback,
}

/// When a hook fires relative to the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookPhase {
    /// Before the domain handler runs.
    Before,
    /// After the transaction committed.
    After,
}

/// The callable body of a hook.
pub type HookHandler = Arc<dyn Fn(&mut HookContext<'_>) -> HookVerdict + Send + Sync>;

/// A registered hook definition (code template).
#[derive(Clone)]
pub struct HookDefinition {
    /// Content-derived hash identifying the definition.
    pub hook_hash: String,
    /// The registering account.
    pub creator: Address,
    /// The executable body; `None` is an inert hook that accepts.
    pub handler: Option<HookHandler>,
    /// Placeholder for compiled hook bytecode.
    pub wasm_hex: String,
    /// State namespace.
    pub namespace: String,
    /// Default parameters, overridable per installation.
    pub parameters: BTreeMap<String, String>,
    /// Bitmask of transaction type tags this hook fires on.
    pub hook_on: u128,
    /// Accounts granted access to this hook's state.
    pub grant_accounts: Vec<Address>,
}

impl fmt::Debug for HookDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDefinition")
            .field("hook_hash", &self.hook_hash)
            .field("creator", &self.creator)
            .field("namespace", &self.namespace)
            .field("hook_on", &self.hook_on)
            .finish()
    }
}

/// A hook installed on a specific account slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledHook {
    /// The hooked account.
    pub account: Address,
    /// Slot position, 0..=3.
    pub position: u8,
    /// The referenced definition.
    pub hook_hash: String,
    /// Installation parameters overriding the definition's defaults.
    pub parameters: BTreeMap<String, String>,
    /// The phase this installation fires in.
    pub phase: HookPhase,
}

/// Record of one hook execution during a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookExecution {
    /// The executed definition.
    pub hook_hash: String,
    /// The hooked account.
    pub account: Address,
    /// The verdict returned.
    pub verdict: HookVerdict,
    /// Hook-set return code.
    pub return_code: i64,
    /// Hook-set return message.
    pub return_string: String,
    /// Synthetic transactions emitted.
    pub emit_count: usize,
    /// Slot index the hook ran from.
    pub execution_index: usize,
}

/// Bounded key-value state for one (account, hook) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookState {
    /// The state entries.
    pub entries: BTreeMap<String, Vec<u8>>,
}

/// Context handed to a hook during execution.
pub struct HookContext<'a> {
    /// The transaction being processed.
    pub tx: &'a Transaction,
    /// The hooked account.
    pub account: &'a str,
    /// The executing definition's hash.
    pub hook_hash: &'a str,
    /// Merged definition + installation parameters.
    pub parameters: BTreeMap<String, String>,
    state: &'a mut HookState,
    emitted: Vec<Transaction>,
    return_code: i64,
    return_string: String,
}

impl<'a> HookContext<'a> {
    /// Read a state entry.
    pub fn get_state(&self, key: &str) -> Option<&[u8]> {
        self.state.entries.get(key).map(Vec::as_slice)
    }

    /// Write a state entry, enforcing the size bounds. Returns false when a
    /// bound would be exceeded.
    pub fn set_state(&mut self, key: &str, value: &[u8]) -> bool {
        if key.len() > MAX_STATE_KEY_LEN || value.len() > MAX_STATE_VALUE_LEN {
            return false;
        }
        if self.state.entries.len() >= MAX_STATE_ENTRIES && !self.state.entries.contains_key(key) {
            return false;
        }
        self.state.entries.insert(key.to_owned(), value.to_vec());
        true
    }

    /// Delete a state entry. Returns whether it existed.
    pub fn delete_state(&mut self, key: &str) -> bool {
        self.state.entries.remove(key).is_some()
    }

    /// Emit a synthetic transaction; at most three per execution.
    pub fn emit(&mut self, tx: Transaction) -> bool {
        if self.emitted.len() >= MAX_EMITTED_TXNS {
            return false;
        }
        self.emitted.push(tx);
        true
    }

    /// Accept with a message and code.
    pub fn accept(&mut self, msg: &str, code: i64) -> HookVerdict {
        self.return_string = msg.to_owned();
        self.return_code = code;
        HookVerdict::Accept
    }

    /// Reject with a message and code.
    pub fn reject(&mut self, msg: &str, code: i64) -> HookVerdict {
        self.return_string = msg.to_owned();
        self.return_code = code;
        HookVerdict::Reject
    }

    /// Roll back with a message and code.
    pub fn rollback(&mut self, msg: &str, code: i64) -> HookVerdict {
        self.return_string = msg.to_owned();
        self.return_code = code;
        HookVerdict::Rollback
    }
}

/// Manages hook definitions, installations and execution.
#[derive(Debug, Clone, Default)]
pub struct HooksManager {
    /// Registered definitions, keyed by hash.
    pub definitions: BTreeMap<String, HookDefinition>,
    installed: BTreeMap<Address, [Option<InstalledHook>; MAX_HOOKS_PER_ACCOUNT]>,
    state: BTreeMap<Address, BTreeMap<String, HookState>>,
    /// Execution log, most recent last.
    pub executions: Vec<HookExecution>,
}

impl HooksManager {
    fn hash_code(creator: &str, name: &str, namespace: &str) -> String {
        let raw = format!("{}:{}:{}", creator, name, namespace);
        hex::encode(&sha256(raw.as_bytes())[..20])
    }

    /// Register a hook definition under a creator-scoped name.
    #[allow(clippy::too_many_arguments)]
    pub fn register_definition(
        &mut self,
        creator: &str,
        name: &str,
        handler: Option<HookHandler>,
        wasm_hex: &str,
        namespace: &str,
        parameters: BTreeMap<String, String>,
        hook_on: u128,
        grant_accounts: Vec<Address>,
    ) -> Result<String, TransactionError> {
        let hook_hash = Self::hash_code(creator, name, namespace);
        if self.definitions.contains_key(&hook_hash) {
            return Err(TransactionError::Duplicate(
                "Hook already registered".into(),
            ));
        }
        self.definitions.insert(
            hook_hash.clone(),
            HookDefinition {
                hook_hash: hook_hash.clone(),
                creator: creator.to_owned(),
                handler,
                wasm_hex: wasm_hex.to_owned(),
                namespace: namespace.to_owned(),
                parameters,
                hook_on,
                grant_accounts,
            },
        );
        Ok(hook_hash)
    }

    /// Install a hook on an account at a slot position (0..=3).
    pub fn set_hook(
        &mut self,
        account: &str,
        position: u8,
        hook_hash: &str,
        parameters: BTreeMap<String, String>,
        phase: HookPhase,
    ) -> Result<(), TransactionError> {
        if position as usize >= MAX_HOOKS_PER_ACCOUNT {
            return Err(TransactionError::Malformed(format!(
                "Position must be 0-{}",
                MAX_HOOKS_PER_ACCOUNT - 1
            )));
        }
        if !self.definitions.contains_key(hook_hash) {
            return Err(TransactionError::NotFound(
                "Hook definition not found".into(),
            ));
        }
        let slots = self.installed.entry(account.to_owned()).or_default();
        slots[position as usize] = Some(InstalledHook {
            account: account.to_owned(),
            position,
            hook_hash: hook_hash.to_owned(),
            parameters,
            phase,
        });
        self.state
            .entry(account.to_owned())
            .or_default()
            .entry(hook_hash.to_owned())
            .or_default();
        log::debug!("hook {} installed on {}[{}]", hook_hash, account, position);
        Ok(())
    }

    /// Remove the hook at a slot position.
    pub fn delete_hook(&mut self, account: &str, position: u8) -> Result<(), TransactionError> {
        let slots = self
            .installed
            .get_mut(account)
            .ok_or_else(|| TransactionError::NotFound("No hook at position".into()))?;
        let slot = slots
            .get_mut(position as usize)
            .ok_or_else(|| TransactionError::NotFound("No hook at position".into()))?;
        if slot.is_none() {
            return Err(TransactionError::Precondition("Slot already empty".into()));
        }
        *slot = None;
        Ok(())
    }

    /// Execute the account's installed hooks matching `phase` and whose
    /// bitmask includes the transaction's type. Returns whether every hook
    /// accepted, plus the execution records.
    pub fn execute_hooks(
        &mut self,
        account: &str,
        tx: &Transaction,
        phase: HookPhase,
    ) -> (bool, Vec<HookExecution>) {
        let Some(slots) = self.installed.get(account).cloned() else {
            return (true, Vec::new());
        };
        let mut results = Vec::new();
        let mut all_accepted = true;

        for (idx, slot) in slots.iter().enumerate() {
            let Some(hook) = slot else { continue };
            if hook.phase != phase {
                continue;
            }
            let Some(defn) = self.definitions.get(&hook.hook_hash).cloned() else {
                continue;
            };
            if defn.hook_on != HOOK_ON_ALL {
                let bit = 1u128 << (tx.tx_type() as u16 as u32);
                if defn.hook_on & bit == 0 {
                    continue;
                }
            }

            let mut parameters = defn.parameters.clone();
            parameters.extend(hook.parameters.clone());
            let state = self
                .state
                .entry(account.to_owned())
                .or_default()
                .entry(hook.hook_hash.clone())
                .or_default();

            let mut ctx = HookContext {
                tx,
                account,
                hook_hash: &hook.hook_hash,
                parameters,
                state,
                emitted: Vec::new(),
                return_code: 0,
                return_string: String::new(),
            };
            let verdict = match &defn.handler {
                Some(handler) => handler(&mut ctx),
                None => HookVerdict::Accept,
            };

            let execution = HookExecution {
                hook_hash: hook.hook_hash.clone(),
                account: account.to_owned(),
                verdict,
                return_code: ctx.return_code,
                return_string: ctx.return_string.clone(),
                emit_count: ctx.emitted.len(),
                execution_index: idx,
            };
            results.push(execution.clone());
            self.executions.push(execution);

            if matches!(verdict, HookVerdict::Reject | HookVerdict::Rollback) {
                all_accepted = false;
            }
        }
        (all_accepted, results)
    }

    /// Installed hooks for an account.
    pub fn get_hooks(&self, account: &str) -> Vec<&InstalledHook> {
        self.installed
            .get(account)
            .map(|slots| slots.iter().flatten().collect())
            .unwrap_or_default()
    }

    /// The state slot of an (account, hook) pair.
    pub fn get_hook_state(&self, account: &str, hook_hash: &str) -> Option<&HookState> {
        self.state.get(account).and_then(|s| s.get(hook_hash))
    }

    /// The most recent `limit` execution records.
    pub fn recent_executions(&self, limit: usize) -> &[HookExecution] {
        let start = self.executions.len().saturating_sub(limit);
        &self.executions[start..]
    }
}
