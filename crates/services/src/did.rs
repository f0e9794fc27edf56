// Path: crates/services/src/did.rs

//! On-ledger decentralized identifiers, one document per account.

use nexaflow_types::app::Address;
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum on-chain data length in hex characters (256 bytes).
pub const MAX_DATA_LENGTH: usize = 512;
/// Maximum URI length in characters.
pub const MAX_URI_LENGTH: usize = 256;
/// Maximum number of attestations per document.
pub const MAX_ATTESTATIONS: usize = 10;

/// An on-ledger DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDocument {
    /// The owning account.
    pub account: Address,
    /// The DID URI, `"did:nxf:{account}"`.
    pub did_id: String,
    /// URI pointing at the off-chain document.
    pub uri: String,
    /// Hex-encoded on-chain payload.
    pub data: String,
    /// Third-party attestation blobs.
    pub attestations: Vec<String>,
    /// Creation time.
    pub created_at: u64,
    /// Last update time.
    pub updated_at: u64,
}

/// Manages all DID documents.
#[derive(Debug, Clone, Default)]
pub struct DidManager {
    /// Documents keyed by owning account.
    pub dids: BTreeMap<Address, DidDocument>,
}

impl DidManager {
    /// Create or update the account's DID document.
    pub fn set_did(
        &mut self,
        account: &str,
        uri: &str,
        data: &str,
        attestations: Option<Vec<String>>,
        now: u64,
    ) -> Result<&DidDocument, TransactionError> {
        if uri.len() > MAX_URI_LENGTH {
            return Err(TransactionError::Malformed(format!(
                "URI exceeds {} characters",
                MAX_URI_LENGTH
            )));
        }
        if data.len() > MAX_DATA_LENGTH {
            return Err(TransactionError::Malformed(format!(
                "Data exceeds {} hex characters",
                MAX_DATA_LENGTH
            )));
        }
        if let Some(atts) = &attestations {
            if atts.len() > MAX_ATTESTATIONS {
                return Err(TransactionError::LimitExceeded(format!(
                    "Max {} attestations",
                    MAX_ATTESTATIONS
                )));
            }
        }

        match self.dids.get_mut(account) {
            Some(existing) => {
                if !uri.is_empty() {
                    existing.uri = uri.to_owned();
                }
                if !data.is_empty() {
                    existing.data = data.to_owned();
                }
                if let Some(atts) = attestations {
                    existing.attestations = atts;
                }
                existing.updated_at = now;
            }
            None => {
                let doc = DidDocument {
                    account: account.to_owned(),
                    did_id: format!("did:nxf:{}", account),
                    uri: uri.to_owned(),
                    data: data.to_owned(),
                    attestations: attestations.unwrap_or_default(),
                    created_at: now,
                    updated_at: now,
                };
                self.dids.insert(account.to_owned(), doc);
            }
        }
        Ok(&self.dids[account])
    }

    /// Delete the account's DID document.
    pub fn delete_did(&mut self, account: &str) -> Result<(), TransactionError> {
        self.dids
            .remove(account)
            .map(|_| ())
            .ok_or_else(|| TransactionError::NotFound("No DID found for account".into()))
    }

    /// The DID document of an account, if any.
    pub fn get_did(&self, account: &str) -> Option<&DidDocument> {
        self.dids.get(account)
    }

    /// Resolve a `did:nxf:` URI to its document.
    pub fn resolve(&self, did_id: &str) -> Option<&DidDocument> {
        did_id
            .strip_prefix("did:nxf:")
            .and_then(|account| self.dids.get(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_creates_then_updates() {
        let mut mgr = DidManager::default();
        let doc = mgr
            .set_did("alice", "https://example.com/doc", "", None, 100)
            .unwrap();
        assert_eq!(doc.did_id, "did:nxf:alice");
        assert_eq!(doc.created_at, 100);

        let doc = mgr.set_did("alice", "", "deadbeef", None, 200).unwrap();
        assert_eq!(doc.uri, "https://example.com/doc");
        assert_eq!(doc.data, "deadbeef");
        assert_eq!(doc.updated_at, 200);
    }

    #[test]
    fn one_did_per_account() {
        let mut mgr = DidManager::default();
        mgr.set_did("alice", "u1", "", None, 1).unwrap();
        mgr.set_did("alice", "u2", "", None, 2).unwrap();
        assert_eq!(mgr.dids.len(), 1);
    }

    #[test]
    fn size_limits() {
        let mut mgr = DidManager::default();
        assert!(mgr
            .set_did("a", &"x".repeat(257), "", None, 1)
            .is_err());
        assert!(mgr
            .set_did("a", "", &"f".repeat(513), None, 1)
            .is_err());
        let too_many = vec![String::new(); 11];
        assert!(mgr.set_did("a", "", "", Some(too_many), 1).is_err());
    }

    #[test]
    fn resolve_and_delete() {
        let mut mgr = DidManager::default();
        mgr.set_did("alice", "u", "", None, 1).unwrap();
        assert!(mgr.resolve("did:nxf:alice").is_some());
        assert!(mgr.resolve("did:other:alice").is_none());
        mgr.delete_did("alice").unwrap();
        assert!(mgr.delete_did("alice").is_err());
    }
}
