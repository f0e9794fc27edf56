// Path: crates/services/src/multi_sign.rs

//! Regular keys and M-of-N weighted signer lists.

use nexaflow_types::app::Address;
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A signer in a multi-sign signer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerEntry {
    /// The signer's address.
    pub account: Address,
    /// The signer's weight toward the quorum.
    pub weight: u16,
}

/// An M-of-N signer list for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerList {
    /// Total weight required for a valid multi-signature.
    pub signer_quorum: u32,
    /// The weighted signers.
    pub signers: Vec<SignerEntry>,
}

impl SignerList {
    /// Sum of all signer weights.
    pub fn total_weight(&self) -> u32 {
        self.signers.iter().map(|s| s.weight as u32).sum()
    }

    /// Check whether a set of signing accounts meets the quorum.
    /// Returns `(met, achieved_weight)`.
    pub fn validate_quorum(&self, signing_accounts: &BTreeSet<Address>) -> (bool, u32) {
        let achieved: u32 = self
            .signers
            .iter()
            .filter(|s| signing_accounts.contains(&s.account))
            .map(|s| s.weight as u32)
            .sum();
        (achieved >= self.signer_quorum, achieved)
    }
}

/// Tracks regular keys and signer lists for all accounts.
#[derive(Debug, Clone, Default)]
pub struct MultiSignManager {
    /// Regular keys, keyed by account.
    pub regular_keys: BTreeMap<Address, Address>,
    /// Signer lists, keyed by account.
    pub signer_lists: BTreeMap<Address, SignerList>,
}

impl MultiSignManager {
    /// Assign, update, or (with an empty key) remove the regular key.
    pub fn set_regular_key(&mut self, account: &str, regular_key: &str) {
        if regular_key.is_empty() {
            self.regular_keys.remove(account);
        } else {
            self.regular_keys
                .insert(account.to_owned(), regular_key.to_owned());
        }
    }

    /// The account's regular key, if any.
    pub fn get_regular_key(&self, account: &str) -> Option<&Address> {
        self.regular_keys.get(account)
    }

    /// Set or update the signer list for an account. A zero quorum with no
    /// entries deletes the list.
    pub fn set_signer_list(
        &mut self,
        account: &str,
        signer_quorum: u32,
        entries: Vec<SignerEntry>,
    ) -> Result<(), TransactionError> {
        if signer_quorum == 0 && entries.is_empty() {
            self.signer_lists.remove(account);
            return Ok(());
        }
        let list = SignerList {
            signer_quorum,
            signers: entries,
        };
        if list.total_weight() < signer_quorum {
            return Err(TransactionError::Malformed(format!(
                "Total signer weight ({}) is less than quorum ({})",
                list.total_weight(),
                signer_quorum
            )));
        }
        let mut seen = BTreeSet::new();
        for signer in &list.signers {
            if !seen.insert(&signer.account) {
                return Err(TransactionError::Malformed(
                    "Duplicate signer accounts".into(),
                ));
            }
        }
        if list.signers.iter().any(|s| s.account == account) {
            return Err(TransactionError::Malformed(
                "Account cannot be in its own signer list".into(),
            ));
        }
        self.signer_lists.insert(account.to_owned(), list);
        Ok(())
    }

    /// The account's signer list, if any.
    pub fn get_signer_list(&self, account: &str) -> Option<&SignerList> {
        self.signer_lists.get(account)
    }

    /// Whether `signer` may sign for `account`: the master key, the regular
    /// key, or any signer-list member.
    pub fn is_authorized_signer(&self, account: &str, signer: &str) -> bool {
        if signer == account {
            return true;
        }
        if self.regular_keys.get(account).is_some_and(|k| k == signer) {
            return true;
        }
        self.signer_lists
            .get(account)
            .is_some_and(|sl| sl.signers.iter().any(|s| s.account == signer))
    }

    /// Validate a multi-signed transaction: the signing set must reach the
    /// account's quorum.
    pub fn validate_multi_sig(
        &self,
        account: &str,
        signing_accounts: &BTreeSet<Address>,
    ) -> Result<u32, TransactionError> {
        let list = self
            .signer_lists
            .get(account)
            .ok_or_else(|| TransactionError::Precondition("No signer list configured".into()))?;
        let (met, achieved) = list.validate_quorum(signing_accounts);
        if !met {
            return Err(TransactionError::Precondition(format!(
                "Quorum not met: {}/{}",
                achieved, list.signer_quorum
            )));
        }
        Ok(achieved)
    }
}
