// Path: crates/state/src/shamap/proof.rs

//! Merkle inclusion/exclusion proofs for the SHAMap.

use super::node::{BRANCH_FACTOR, EMPTY_HASH};
use nexaflow_crypto::{sha512_half, Hash256};

/// One level of a proof path: the branch taken and the 15 sibling hashes in
/// slot order (empty slots recorded as the empty hash).
pub type ProofLevel = (u8, Vec<Hash256>);

/// Proof of inclusion or exclusion for a key in the SHAMap.
///
/// `leaf_data = None` makes this an exclusion proof: it verifies only when
/// the addressed slot was genuinely empty at proof time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// The keylet the proof addresses.
    pub key: Hash256,
    /// The leaf bytes, or `None` for an exclusion proof.
    pub leaf_data: Option<Vec<u8>>,
    /// Per-depth `(branch_index, sibling_hashes)` along the key's path.
    pub path: Vec<ProofLevel>,
    /// The root hash this proof anchors to.
    pub root_hash: Hash256,
}

impl MerkleProof {
    /// Verify the proof against its recorded root hash.
    ///
    /// Folds the leaf hash (or the empty hash for exclusion) back up through
    /// the recorded siblings and compares the result to `root_hash`.
    pub fn verify(&self) -> bool {
        let mut current = match &self.leaf_data {
            Some(data) => {
                let mut buf = Vec::with_capacity(32 + data.len());
                buf.extend_from_slice(&self.key);
                buf.extend_from_slice(data);
                sha512_half(&buf)
            }
            None => EMPTY_HASH,
        };

        for (branch_idx, siblings) in self.path.iter().rev() {
            let mut buf = Vec::with_capacity(BRANCH_FACTOR * 32);
            let mut sibling_iter = siblings.iter();
            for slot in 0..BRANCH_FACTOR {
                if slot == *branch_idx as usize {
                    buf.extend_from_slice(&current);
                } else {
                    match sibling_iter.next() {
                        Some(hash) => buf.extend_from_slice(hash),
                        None => buf.extend_from_slice(&EMPTY_HASH),
                    }
                }
            }
            current = sha512_half(&buf);
        }

        current == self.root_hash
    }
}
