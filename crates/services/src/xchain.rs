// Path: crates/services/src/xchain.rs

//! Cross-chain bridges: value transfer between a locking chain and an
//! issuing chain.
//!
//! A bridge pairs two door accounts and their issue descriptors. Claim ids
//! are allocated per-bridge and strictly increasing; a commit locks value
//! against a claim id; witnesses attest (one attestation per witness); the
//! claim pays out once committed, attested by at least the witness quorum,
//! and addressed to the right destination.

use nexaflow_crypto::sha256;
use nexaflow_types::app::{Address, Drops, IssueSpec};
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cross-chain bridge definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDefinition {
    /// Unique bridge id, derived from doors and issues.
    pub bridge_id: String,
    /// Door account on the locking chain.
    pub locking_chain_door: Address,
    /// Door account on the issuing chain.
    pub issuing_chain_door: Address,
    /// Asset locked on the locking chain.
    pub locking_chain_issue: IssueSpec,
    /// Asset issued on the issuing chain.
    pub issuing_chain_issue: IssueSpec,
    /// Minimum drops for a cross-chain account create.
    pub min_account_create_amount: Drops,
    /// Reward paid to witnesses, deducted from the claimed amount.
    pub signal_reward: Drops,
}

/// A witness attestation for a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// The attesting witness.
    pub witness: Address,
    /// The witness signature blob (opaque here).
    pub signature: String,
    /// When the attestation arrived.
    pub attested_at: u64,
}

/// A reserved claim id for an in-flight cross-chain transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimId {
    /// The per-bridge sequence number.
    pub claim_id: u64,
    /// The owning bridge.
    pub bridge_id: String,
    /// Who reserved the claim.
    pub sender: Address,
    /// Required destination; empty = unrestricted until commit.
    pub destination: Address,
    /// The committed amount, once committed.
    pub amount: Drops,
    /// Witness attestations, unique per witness.
    pub attestations: Vec<Attestation>,
    /// Set once value has been locked against this claim.
    pub committed: bool,
    /// Terminal: the claim has been paid out.
    pub claimed: bool,
}

/// Record of a locked amount on the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XChainCommitRecord {
    /// `"{bridge_id}:{claim_id}"`.
    pub commit_id: String,
    /// The owning bridge.
    pub bridge_id: String,
    /// Who locked the value.
    pub sender: Address,
    /// Drops locked.
    pub amount: Drops,
    /// The claim this commit funds.
    pub claim_id: u64,
    /// Destination carried with the commit, if any.
    pub destination: Address,
}

/// Manages cross-chain bridge operations.
#[derive(Debug, Clone)]
pub struct XChainManager {
    /// All bridges, keyed by id.
    pub bridges: BTreeMap<String, BridgeDefinition>,
    claims: BTreeMap<String, BTreeMap<u64, ClaimId>>,
    commits: BTreeMap<String, Vec<XChainCommitRecord>>,
    claim_seq: BTreeMap<String, u64>,
    min_witnesses: usize,
}

impl XChainManager {
    /// A manager requiring `min_witnesses` attestations per claim.
    pub fn new(min_witnesses: usize) -> Self {
        Self {
            bridges: BTreeMap::new(),
            claims: BTreeMap::new(),
            commits: BTreeMap::new(),
            claim_seq: BTreeMap::new(),
            min_witnesses,
        }
    }

    fn bridge_id_of(
        locking_door: &str,
        issuing_door: &str,
        locking_issue: &IssueSpec,
        issuing_issue: &IssueSpec,
    ) -> String {
        let raw = format!(
            "XCHAIN:{}:{}:{}/{}:{}/{}",
            locking_door,
            issuing_door,
            locking_issue.currency,
            locking_issue.issuer,
            issuing_issue.currency,
            issuing_issue.issuer
        );
        hex::encode(&sha256(raw.as_bytes())[..20])
    }

    /// Create a new bridge definition.
    pub fn create_bridge(
        &mut self,
        locking_chain_door: &str,
        issuing_chain_door: &str,
        locking_chain_issue: IssueSpec,
        issuing_chain_issue: IssueSpec,
        min_account_create_amount: Drops,
        signal_reward: Drops,
    ) -> Result<&BridgeDefinition, TransactionError> {
        let bridge_id = Self::bridge_id_of(
            locking_chain_door,
            issuing_chain_door,
            &locking_chain_issue,
            &issuing_chain_issue,
        );
        if self.bridges.contains_key(&bridge_id) {
            return Err(TransactionError::Duplicate("Bridge already exists".into()));
        }
        let bridge = BridgeDefinition {
            bridge_id: bridge_id.clone(),
            locking_chain_door: locking_chain_door.to_owned(),
            issuing_chain_door: issuing_chain_door.to_owned(),
            locking_chain_issue,
            issuing_chain_issue,
            min_account_create_amount,
            signal_reward,
        };
        self.bridges.insert(bridge_id.clone(), bridge);
        self.claims.insert(bridge_id.clone(), BTreeMap::new());
        self.commits.insert(bridge_id.clone(), Vec::new());
        self.claim_seq.insert(bridge_id.clone(), 1);
        log::info!("bridge {} created", bridge_id);
        Ok(&self.bridges[&bridge_id])
    }

    /// Reserve the next claim id on a bridge.
    pub fn create_claim_id(
        &mut self,
        bridge_id: &str,
        sender: &str,
        destination: Option<&str>,
    ) -> Result<u64, TransactionError> {
        if !self.bridges.contains_key(bridge_id) {
            return Err(TransactionError::NotFound("Bridge not found".into()));
        }
        let seq = self.claim_seq.get(bridge_id).copied().unwrap_or(1);
        self.claim_seq.insert(bridge_id.to_owned(), seq + 1);

        let claim = ClaimId {
            claim_id: seq,
            bridge_id: bridge_id.to_owned(),
            sender: sender.to_owned(),
            destination: destination.unwrap_or_default().to_owned(),
            amount: 0,
            attestations: Vec::new(),
            committed: false,
            claimed: false,
        };
        self.claims
            .entry(bridge_id.to_owned())
            .or_default()
            .insert(seq, claim);
        Ok(seq)
    }

    /// Lock value on the source chain against a claim id.
    pub fn commit(
        &mut self,
        bridge_id: &str,
        sender: &str,
        amount: Drops,
        claim_id: u64,
        destination: Option<&str>,
    ) -> Result<(), TransactionError> {
        if !self.bridges.contains_key(bridge_id) {
            return Err(TransactionError::NotFound("Bridge not found".into()));
        }
        if amount == 0 {
            return Err(TransactionError::BadAmount("Amount must be positive".into()));
        }
        let claim = self
            .claims
            .get_mut(bridge_id)
            .and_then(|claims| claims.get_mut(&claim_id))
            .ok_or_else(|| TransactionError::NotFound("Claim ID not found".into()))?;
        if claim.committed {
            return Err(TransactionError::Duplicate("Already committed".into()));
        }
        claim.committed = true;
        claim.amount = amount;
        if let Some(dest) = destination {
            claim.destination = dest.to_owned();
        }

        let record = XChainCommitRecord {
            commit_id: format!("{}:{}", bridge_id, claim_id),
            bridge_id: bridge_id.to_owned(),
            sender: sender.to_owned(),
            amount,
            claim_id,
            destination: destination.unwrap_or_default().to_owned(),
        };
        self.commits
            .entry(bridge_id.to_owned())
            .or_default()
            .push(record);
        Ok(())
    }

    /// Add a witness attestation for a committed claim. One per witness.
    pub fn add_attestation(
        &mut self,
        bridge_id: &str,
        claim_id: u64,
        witness: &str,
        signature: &str,
        now: u64,
    ) -> Result<usize, TransactionError> {
        let claim = self
            .claims
            .get_mut(bridge_id)
            .and_then(|claims| claims.get_mut(&claim_id))
            .ok_or_else(|| TransactionError::NotFound("Claim ID not found".into()))?;
        if !claim.committed {
            return Err(TransactionError::Precondition("Not yet committed".into()));
        }
        if claim.attestations.iter().any(|a| a.witness == witness) {
            return Err(TransactionError::Duplicate(
                "Witness already attested".into(),
            ));
        }
        claim.attestations.push(Attestation {
            witness: witness.to_owned(),
            signature: signature.to_owned(),
            attested_at: now,
        });
        Ok(claim.attestations.len())
    }

    /// Pay out a claim on the destination chain. Requires the claim to be
    /// committed, attested by the witness quorum, unclaimed, and addressed
    /// to `destination` when the claim is restricted. The payout is the
    /// committed amount minus the signal reward.
    pub fn claim(
        &mut self,
        bridge_id: &str,
        claim_id: u64,
        destination: &str,
    ) -> Result<Drops, TransactionError> {
        let signal_reward = self
            .bridges
            .get(bridge_id)
            .map(|b| b.signal_reward)
            .ok_or_else(|| TransactionError::NotFound("Bridge not found".into()))?;
        let min_witnesses = self.min_witnesses;
        let claim = self
            .claims
            .get_mut(bridge_id)
            .and_then(|claims| claims.get_mut(&claim_id))
            .ok_or_else(|| TransactionError::NotFound("Claim ID not found".into()))?;
        if !claim.committed {
            return Err(TransactionError::Precondition("Not yet committed".into()));
        }
        if claim.claimed {
            return Err(TransactionError::Duplicate("Already claimed".into()));
        }
        if claim.attestations.len() < min_witnesses {
            return Err(TransactionError::Precondition(format!(
                "Need {} attestations, have {}",
                min_witnesses,
                claim.attestations.len()
            )));
        }
        if !claim.destination.is_empty() && claim.destination != destination {
            return Err(TransactionError::NotAuthorized(
                "Destination mismatch".into(),
            ));
        }
        claim.claimed = true;
        let payout = claim.amount.saturating_sub(signal_reward);
        log::info!(
            "xchain claim {}:{} paid out {} drops to {}",
            bridge_id,
            claim_id,
            payout,
            destination
        );
        Ok(payout)
    }

    /// Commit to create a new account on the destination chain. The claim
    /// is created pre-committed.
    pub fn account_create_commit(
        &mut self,
        bridge_id: &str,
        sender: &str,
        amount: Drops,
        destination: &str,
    ) -> Result<u64, TransactionError> {
        let bridge = self
            .bridges
            .get(bridge_id)
            .ok_or_else(|| TransactionError::NotFound("Bridge not found".into()))?;
        if amount < bridge.min_account_create_amount {
            return Err(TransactionError::Precondition(format!(
                "Amount must be >= {}",
                bridge.min_account_create_amount
            )));
        }
        let seq = self.claim_seq.get(bridge_id).copied().unwrap_or(1);
        self.claim_seq.insert(bridge_id.to_owned(), seq + 1);

        let claim = ClaimId {
            claim_id: seq,
            bridge_id: bridge_id.to_owned(),
            sender: sender.to_owned(),
            destination: destination.to_owned(),
            amount,
            attestations: Vec::new(),
            committed: true,
            claimed: false,
        };
        self.claims
            .entry(bridge_id.to_owned())
            .or_default()
            .insert(seq, claim);
        Ok(seq)
    }

    /// Look up a bridge.
    pub fn get_bridge(&self, bridge_id: &str) -> Option<&BridgeDefinition> {
        self.bridges.get(bridge_id)
    }

    /// Look up a claim.
    pub fn get_claim(&self, bridge_id: &str, claim_id: u64) -> Option<&ClaimId> {
        self.claims.get(bridge_id).and_then(|c| c.get(&claim_id))
    }

    /// Commit records for a bridge.
    pub fn get_commits(&self, bridge_id: &str) -> &[XChainCommitRecord] {
        self.commits
            .get(bridge_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_issue() -> IssueSpec {
        IssueSpec {
            currency: "NXF".into(),
            issuer: String::new(),
        }
    }

    fn setup() -> (XChainManager, String) {
        let mut mgr = XChainManager::new(2);
        let id = mgr
            .create_bridge(
                "door-lock",
                "door-issue",
                native_issue(),
                native_issue(),
                10_000_000,
                10_000,
            )
            .unwrap()
            .bridge_id
            .clone();
        (mgr, id)
    }

    #[test]
    fn bridge_id_deterministic_and_unique() {
        let (mut mgr, _) = setup();
        let err = mgr
            .create_bridge(
                "door-lock",
                "door-issue",
                native_issue(),
                native_issue(),
                10_000_000,
                10_000,
            )
            .unwrap_err();
        assert!(matches!(err, TransactionError::Duplicate(_)));
    }

    #[test]
    fn claim_ids_are_sequential_per_bridge() {
        let (mut mgr, bid) = setup();
        assert_eq!(mgr.create_claim_id(&bid, "alice", None).unwrap(), 1);
        assert_eq!(mgr.create_claim_id(&bid, "bob", None).unwrap(), 2);
    }

    #[test]
    fn full_transfer_flow() {
        let (mut mgr, bid) = setup();
        let cid = mgr.create_claim_id(&bid, "alice", Some("bob")).unwrap();
        mgr.commit(&bid, "alice", 5_000_000, cid, None).unwrap();

        // Quorum is 2: one attestation is not enough.
        mgr.add_attestation(&bid, cid, "w1", "sig1", 1).unwrap();
        assert!(mgr.claim(&bid, cid, "bob").is_err());

        // Duplicate witness rejected.
        assert!(matches!(
            mgr.add_attestation(&bid, cid, "w1", "sig1b", 2).unwrap_err(),
            TransactionError::Duplicate(_)
        ));

        mgr.add_attestation(&bid, cid, "w2", "sig2", 3).unwrap();

        // Destination restriction honoured.
        assert!(mgr.claim(&bid, cid, "mallory").is_err());

        let payout = mgr.claim(&bid, cid, "bob").unwrap();
        assert_eq!(payout, 5_000_000 - 10_000);

        // A claim pays out exactly once.
        assert!(matches!(
            mgr.claim(&bid, cid, "bob").unwrap_err(),
            TransactionError::Duplicate(_)
        ));
    }

    #[test]
    fn commit_is_single_shot_and_requires_claim() {
        let (mut mgr, bid) = setup();
        assert!(mgr.commit(&bid, "alice", 100, 9, None).is_err());
        let cid = mgr.create_claim_id(&bid, "alice", None).unwrap();
        mgr.commit(&bid, "alice", 100, cid, None).unwrap();
        assert!(matches!(
            mgr.commit(&bid, "alice", 100, cid, None).unwrap_err(),
            TransactionError::Duplicate(_)
        ));
    }

    #[test]
    fn attestation_requires_commit() {
        let (mut mgr, bid) = setup();
        let cid = mgr.create_claim_id(&bid, "alice", None).unwrap();
        assert!(mgr.add_attestation(&bid, cid, "w1", "s", 1).is_err());
    }

    #[test]
    fn account_create_enforces_minimum() {
        let (mut mgr, bid) = setup();
        assert!(mgr
            .account_create_commit(&bid, "alice", 9_999_999, "newbie")
            .is_err());
        let cid = mgr
            .account_create_commit(&bid, "alice", 10_000_000, "newbie")
            .unwrap();
        assert!(mgr.get_claim(&bid, cid).unwrap().committed);
    }
}
