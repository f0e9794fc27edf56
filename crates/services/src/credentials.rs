// Path: crates/services/src/credentials.rs

//! On-ledger verifiable credentials.
//!
//! An issuer creates a credential for a subject; the subject accepts it;
//! either party may delete it. Credentials feed deposit authorization and
//! other permissioned features.

use nexaflow_crypto::sha256;
use nexaflow_types::app::Address;
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum credential type length.
pub const MAX_TYPE_LENGTH: usize = 64;
/// Maximum URI length.
pub const MAX_URI_LENGTH: usize = 256;

/// An on-ledger credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// Unique id derived from (issuer, subject, type).
    pub credential_id: String,
    /// The issuing account.
    pub issuer: Address,
    /// The subject account.
    pub subject: Address,
    /// Arbitrary type string, at most 64 characters.
    pub credential_type: String,
    /// Optional link to off-chain data.
    pub uri: String,
    /// Expiration time; 0 = none.
    pub expiration: u64,
    /// Set once the subject accepts.
    pub accepted: bool,
    /// Creation time.
    pub created_at: u64,
    /// Acceptance time; 0 until accepted.
    pub accepted_at: u64,
}

impl CredentialEntry {
    /// A credential is valid once accepted and before expiry.
    pub fn is_valid(&self, now: u64) -> bool {
        self.accepted && (self.expiration == 0 || now <= self.expiration)
    }
}

/// Manages all on-ledger credentials.
#[derive(Debug, Clone, Default)]
pub struct CredentialManager {
    /// All credentials, keyed by id.
    pub credentials: BTreeMap<String, CredentialEntry>,
    issuer_index: BTreeMap<Address, Vec<String>>,
    subject_index: BTreeMap<Address, Vec<String>>,
}

impl CredentialManager {
    fn make_id(issuer: &str, subject: &str, credential_type: &str) -> String {
        let raw = format!("CRED:{}:{}:{}", issuer, subject, credential_type);
        hex::encode(&sha256(raw.as_bytes())[..20])
    }

    /// Create a credential.
    pub fn create(
        &mut self,
        issuer: &str,
        subject: &str,
        credential_type: &str,
        uri: &str,
        expiration: u64,
        now: u64,
    ) -> Result<&CredentialEntry, TransactionError> {
        if credential_type.is_empty() || credential_type.len() > MAX_TYPE_LENGTH {
            return Err(TransactionError::Malformed(format!(
                "Credential type required, max {} chars",
                MAX_TYPE_LENGTH
            )));
        }
        if uri.len() > MAX_URI_LENGTH {
            return Err(TransactionError::Malformed(format!(
                "URI max {} chars",
                MAX_URI_LENGTH
            )));
        }
        if issuer == subject {
            return Err(TransactionError::Malformed(
                "Issuer and subject must differ".into(),
            ));
        }
        if expiration > 0 && expiration < now {
            return Err(TransactionError::Malformed(
                "Expiration must be in the future".into(),
            ));
        }
        let credential_id = Self::make_id(issuer, subject, credential_type);
        if self.credentials.contains_key(&credential_id) {
            return Err(TransactionError::Duplicate(
                "Credential already exists".into(),
            ));
        }

        let entry = CredentialEntry {
            credential_id: credential_id.clone(),
            issuer: issuer.to_owned(),
            subject: subject.to_owned(),
            credential_type: credential_type.to_owned(),
            uri: uri.to_owned(),
            expiration,
            accepted: false,
            created_at: now,
            accepted_at: 0,
        };
        self.credentials.insert(credential_id.clone(), entry);
        self.issuer_index
            .entry(issuer.to_owned())
            .or_default()
            .push(credential_id.clone());
        self.subject_index
            .entry(subject.to_owned())
            .or_default()
            .push(credential_id.clone());
        Ok(&self.credentials[&credential_id])
    }

    /// The subject accepts a credential. Accepting twice is a no-op.
    pub fn accept(
        &mut self,
        subject: &str,
        credential_id: &str,
        now: u64,
    ) -> Result<&CredentialEntry, TransactionError> {
        let cred = self
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| TransactionError::NotFound("Credential not found".into()))?;
        if cred.subject != subject {
            return Err(TransactionError::NotAuthorized("Not the subject".into()));
        }
        if !cred.accepted {
            cred.accepted = true;
            cred.accepted_at = now;
        }
        Ok(cred)
    }

    /// Delete a credential; issuer or subject only.
    pub fn delete(&mut self, account: &str, credential_id: &str) -> Result<(), TransactionError> {
        let cred = self
            .credentials
            .get(credential_id)
            .ok_or_else(|| TransactionError::NotFound("Credential not found".into()))?;
        if account != cred.issuer && account != cred.subject {
            return Err(TransactionError::NotAuthorized(
                "Not authorized to delete".into(),
            ));
        }
        let issuer = cred.issuer.clone();
        let subject = cred.subject.clone();
        self.credentials.remove(credential_id);
        if let Some(ids) = self.issuer_index.get_mut(&issuer) {
            ids.retain(|id| id != credential_id);
        }
        if let Some(ids) = self.subject_index.get_mut(&subject) {
            ids.retain(|id| id != credential_id);
        }
        Ok(())
    }

    /// Look up a credential by id.
    pub fn get_credential(&self, credential_id: &str) -> Option<&CredentialEntry> {
        self.credentials.get(credential_id)
    }

    /// Credentials issued by an account.
    pub fn by_issuer(&self, issuer: &str) -> Vec<&CredentialEntry> {
        self.issuer_index
            .get(issuer)
            .map(|ids| ids.iter().filter_map(|id| self.credentials.get(id)).collect())
            .unwrap_or_default()
    }

    /// Credentials held by a subject.
    pub fn by_subject(&self, subject: &str) -> Vec<&CredentialEntry> {
        self.subject_index
            .get(subject)
            .map(|ids| ids.iter().filter_map(|id| self.credentials.get(id)).collect())
            .unwrap_or_default()
    }

    /// Whether a valid (accepted, unexpired) credential of this type exists.
    pub fn check_credential(
        &self,
        issuer: &str,
        subject: &str,
        credential_type: &str,
        now: u64,
    ) -> bool {
        let id = Self::make_id(issuer, subject, credential_type);
        self.credentials
            .get(&id)
            .is_some_and(|c| c.is_valid(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_create_accept_check() {
        let mut mgr = CredentialManager::default();
        let id = mgr
            .create("issuer", "alice", "kyc", "", 0, 100)
            .unwrap()
            .credential_id
            .clone();

        // Not valid until accepted.
        assert!(!mgr.check_credential("issuer", "alice", "kyc", 100));
        assert!(mgr.accept("bob", &id, 101).is_err());
        mgr.accept("alice", &id, 101).unwrap();
        assert!(mgr.check_credential("issuer", "alice", "kyc", 102));
    }

    #[test]
    fn expiry_invalidates() {
        let mut mgr = CredentialManager::default();
        let id = mgr
            .create("issuer", "alice", "kyc", "", 500, 100)
            .unwrap()
            .credential_id
            .clone();
        mgr.accept("alice", &id, 101).unwrap();
        assert!(mgr.check_credential("issuer", "alice", "kyc", 500));
        assert!(!mgr.check_credential("issuer", "alice", "kyc", 501));
    }

    #[test]
    fn self_issuance_and_duplicates_rejected() {
        let mut mgr = CredentialManager::default();
        assert!(mgr.create("alice", "alice", "kyc", "", 0, 1).is_err());
        mgr.create("issuer", "alice", "kyc", "", 0, 1).unwrap();
        assert!(matches!(
            mgr.create("issuer", "alice", "kyc", "", 0, 2).unwrap_err(),
            TransactionError::Duplicate(_)
        ));
    }

    #[test]
    fn delete_by_either_party_only() {
        let mut mgr = CredentialManager::default();
        let id = mgr
            .create("issuer", "alice", "kyc", "", 0, 1)
            .unwrap()
            .credential_id
            .clone();
        assert!(mgr.delete("mallory", &id).is_err());
        mgr.delete("alice", &id).unwrap();
        assert!(mgr.get_credential(&id).is_none());
        assert!(mgr.by_subject("alice").is_empty());
    }
}
