// Path: crates/state/src/shamap/mod.rs

//! SHAMap, the Merkle hash-trie holding all ledger state.
//!
//! A 16-ary radix trie indexed by successive hex nibbles of the 32-byte
//! keylet. Leaves store an object's canonical serialized bytes; inner nodes
//! hash the concatenation of their 16 child hashes (empty slots hash as 32
//! zero bytes). Inner hashes are cached and invalidated lazily along the
//! mutated path, so the root hash is recomputed only on demand.
//!
//! The trie shape is canonical: every leaf sits at the first depth that
//! distinguishes it, and removals collapse single-leaf subtrees back up.
//! Two maps holding the same (key, data) multi-set therefore always have
//! identical root hashes, regardless of operation order.

pub mod node;
pub mod proof;

use nexaflow_crypto::Hash256;
use nexaflow_types::error::StateError;
use node::{Collapse, InnerNode, LeafNode, Node, EMPTY_HASH};
pub use proof::MerkleProof;

/// Nibbles per 32-byte key.
const KEY_NIBBLES: usize = 64;

fn check_key(key: &[u8]) -> Result<Hash256, StateError> {
    let mut out = [0u8; 32];
    if key.len() != 32 {
        return Err(StateError::InvalidKeyLength {
            expected: 32,
            got: key.len(),
        });
    }
    out.copy_from_slice(key);
    Ok(out)
}

fn nibble_at(key: &Hash256, depth: usize) -> usize {
    let byte = key[depth / 2];
    if depth % 2 == 0 {
        (byte >> 4) as usize
    } else {
        (byte & 0x0F) as usize
    }
}

/// The SHA-512-Half Merkle trie for ledger state.
///
/// Keys are 32-byte keylets; values are arbitrary byte strings.
#[derive(Debug, Clone, Default)]
pub struct SHAMap {
    root: InnerNode,
    count: usize,
}

impl SHAMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leaves in the trie.
    pub fn size(&self) -> usize {
        self.count
    }

    /// The Merkle root hash over the whole state.
    pub fn root_hash(&self) -> Hash256 {
        self.root.hash()
    }

    /// Insert or update a leaf.
    pub fn insert(&mut self, key: &[u8], data: Vec<u8>, object_type: u8) -> Result<(), StateError> {
        let key = check_key(key)?;
        let mut count = self.count;
        insert_into(&mut self.root, key, data, object_type, 0, &mut count);
        self.count = count;
        Ok(())
    }

    /// Retrieve the data stored under a key, or `None`.
    pub fn get(&self, key: &[u8]) -> Result<Option<&[u8]>, StateError> {
        let key = check_key(key)?;
        let mut node = &self.root;
        for depth in 0..KEY_NIBBLES {
            let idx = nibble_at(&key, depth);
            match node.children[idx].as_deref() {
                None => return Ok(None),
                Some(Node::Leaf(leaf)) => {
                    return Ok((leaf.key == key).then_some(leaf.data.as_slice()));
                }
                Some(Node::Inner(inner)) => node = inner,
            }
        }
        Ok(None)
    }

    /// Remove a leaf by key. Returns `true` if the key was present.
    pub fn remove(&mut self, key: &[u8]) -> Result<bool, StateError> {
        let key = check_key(key)?;
        let removed = remove_from(&mut self.root, &key, 0);
        if removed {
            self.count -= 1;
        }
        Ok(removed)
    }

    /// Generate an inclusion/exclusion proof for a key.
    pub fn get_proof(&self, key: &[u8]) -> Result<MerkleProof, StateError> {
        let key = check_key(key)?;
        let mut node = &self.root;
        let mut path = Vec::new();
        let mut leaf_data = None;

        for depth in 0..KEY_NIBBLES {
            let idx = nibble_at(&key, depth);
            let mut siblings = Vec::with_capacity(15);
            for (slot, child) in node.children.iter().enumerate() {
                if slot != idx {
                    siblings.push(child.as_deref().map(Node::hash).unwrap_or(EMPTY_HASH));
                }
            }
            path.push((idx as u8, siblings));

            match node.children[idx].as_deref() {
                None => break,
                Some(Node::Leaf(leaf)) => {
                    if leaf.key == key {
                        leaf_data = Some(leaf.data.clone());
                    }
                    break;
                }
                Some(Node::Inner(inner)) => node = inner,
            }
        }

        Ok(MerkleProof {
            key,
            leaf_data,
            path,
            root_hash: self.root_hash(),
        })
    }

    /// All leaves in the trie, in key order.
    pub fn all_leaves(&self) -> Vec<&LeafNode> {
        let mut out = Vec::with_capacity(self.count);
        collect_leaves(&self.root, &mut out);
        out
    }
}

fn insert_into(
    inner: &mut InnerNode,
    key: Hash256,
    data: Vec<u8>,
    object_type: u8,
    depth: usize,
    count: &mut usize,
) {
    inner.invalidate();
    let idx = nibble_at(&key, depth);
    match inner.children[idx].as_deref_mut() {
        None => {
            inner.children[idx] = Some(Box::new(Node::Leaf(LeafNode {
                key,
                data,
                object_type,
            })));
            *count += 1;
            return;
        }
        Some(Node::Inner(child)) => {
            insert_into(child, key, data, object_type, depth + 1, count);
            return;
        }
        Some(Node::Leaf(leaf)) => {
            if leaf.key == key {
                leaf.data = data;
                leaf.object_type = object_type;
                return;
            }
        }
    }

    // Collision with a different leaf: split the slot into an inner node,
    // push the existing leaf one level down, then retry at the next depth.
    if let Some(boxed) = inner.children[idx].as_deref_mut() {
        if let Node::Leaf(existing) = std::mem::replace(boxed, Node::Inner(InnerNode::default())) {
            let existing_idx = nibble_at(&existing.key, depth + 1);
            if let Node::Inner(new_inner) = boxed {
                new_inner.children[existing_idx] = Some(Box::new(Node::Leaf(existing)));
                insert_into(new_inner, key, data, object_type, depth + 1, count);
            }
        }
    }
}

fn remove_from(inner: &mut InnerNode, key: &Hash256, depth: usize) -> bool {
    let idx = nibble_at(key, depth);

    let leaf_matches = matches!(
        inner.children[idx].as_deref(),
        Some(Node::Leaf(leaf)) if leaf.key == *key
    );
    if leaf_matches {
        inner.children[idx] = None;
        inner.invalidate();
        return true;
    }

    let removed = match inner.children[idx].as_deref_mut() {
        Some(Node::Inner(child)) => {
            let removed = remove_from(child, key, depth + 1);
            if removed {
                match child.collapse_state() {
                    Collapse::Empty => inner.children[idx] = None,
                    Collapse::Single(leaf) => {
                        inner.children[idx] = Some(Box::new(Node::Leaf(leaf)));
                    }
                    Collapse::Keep => {}
                }
            }
            removed
        }
        _ => false,
    };
    if removed {
        inner.invalidate();
    }
    removed
}

fn collect_leaves<'a>(inner: &'a InnerNode, out: &mut Vec<&'a LeafNode>) {
    for child in &inner.children {
        match child.as_deref() {
            None => {}
            Some(Node::Leaf(leaf)) => out.push(leaf),
            Some(Node::Inner(node)) => collect_leaves(node, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexaflow_crypto::sha512_half;
    use proptest::prelude::*;

    fn key(tag: &str) -> Hash256 {
        sha512_half(tag.as_bytes())
    }

    #[test]
    fn insert_get_roundtrip() {
        let mut map = SHAMap::new();
        map.insert(&key("a"), b"alpha".to_vec(), 0).unwrap();
        map.insert(&key("b"), b"beta".to_vec(), 0).unwrap();

        assert_eq!(map.get(&key("a")).unwrap(), Some(&b"alpha"[..]));
        assert_eq!(map.get(&key("b")).unwrap(), Some(&b"beta"[..]));
        assert_eq!(map.get(&key("c")).unwrap(), None);
        assert_eq!(map.size(), 2);
    }

    #[test]
    fn update_changes_root_not_size() {
        let mut map = SHAMap::new();
        map.insert(&key("a"), b"v1".to_vec(), 0).unwrap();
        let root1 = map.root_hash();
        map.insert(&key("a"), b"v2".to_vec(), 0).unwrap();
        assert_ne!(map.root_hash(), root1);
        assert_eq!(map.size(), 1);
        assert_eq!(map.get(&key("a")).unwrap(), Some(&b"v2"[..]));
    }

    #[test]
    fn remove_restores_previous_root() {
        let mut map = SHAMap::new();
        for tag in ["a", "b", "c", "d", "e"] {
            map.insert(&key(tag), tag.as_bytes().to_vec(), 0).unwrap();
        }
        let root_before = map.root_hash();

        map.insert(&key("x"), b"transient".to_vec(), 0).unwrap();
        assert_ne!(map.root_hash(), root_before);

        assert!(map.remove(&key("x")).unwrap());
        assert_eq!(map.get(&key("x")).unwrap(), None);
        assert_eq!(map.root_hash(), root_before);
    }

    #[test]
    fn remove_missing_returns_false() {
        let mut map = SHAMap::new();
        map.insert(&key("a"), b"v".to_vec(), 0).unwrap();
        assert!(!map.remove(&key("zz")).unwrap());
        assert_eq!(map.size(), 1);
    }

    #[test]
    fn malformed_key_rejected_at_boundary() {
        let mut map = SHAMap::new();
        let err = map.insert(b"short", b"v".to_vec(), 0).unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidKeyLength {
                expected: 32,
                got: 5
            }
        ));
        assert!(map.get(&[0u8; 31]).is_err());
    }

    #[test]
    fn inclusion_proof_verifies_and_breaks_after_mutation() {
        let mut map = SHAMap::new();
        for tag in ["a", "b", "c", "d"] {
            map.insert(&key(tag), tag.as_bytes().to_vec(), 0).unwrap();
        }
        let proof = map.get_proof(&key("b")).unwrap();
        assert_eq!(proof.leaf_data.as_deref(), Some(&b"b"[..]));
        assert!(proof.verify());

        // Any mutation at the key invalidates proofs against the new root.
        map.insert(&key("b"), b"changed".to_vec(), 0).unwrap();
        let stale = MerkleProof {
            root_hash: map.root_hash(),
            ..proof
        };
        assert!(!stale.verify());
    }

    #[test]
    fn exclusion_proof_verifies_for_empty_slot() {
        let mut map = SHAMap::new();
        map.insert(&key("only"), b"v".to_vec(), 0).unwrap();
        // A key whose first nibble differs lands in an empty root slot.
        let absent = (0u16..)
            .map(|i| key(&format!("probe{}", i)))
            .find(|k| k[0] >> 4 != key("only")[0] >> 4)
            .unwrap();
        let proof = map.get_proof(&absent).unwrap();
        assert!(proof.leaf_data.is_none());
        assert!(proof.verify());
    }

    #[test]
    fn empty_map_root_is_stable() {
        let a = SHAMap::new();
        let b = SHAMap::new();
        assert_eq!(a.root_hash(), b.root_hash());
        assert_eq!(a.size(), 0);
    }

    proptest! {
        /// The root hash is a pure function of the (key, data) multi-set:
        /// insertion order never matters.
        #[test]
        fn root_hash_is_order_independent(mut tags in proptest::collection::vec(0u32..5_000, 1..60)) {
            tags.sort_unstable();
            tags.dedup();

            let mut forward = SHAMap::new();
            for t in &tags {
                forward.insert(&key(&t.to_string()), t.to_be_bytes().to_vec(), 0).unwrap();
            }

            let mut reversed = SHAMap::new();
            for t in tags.iter().rev() {
                reversed.insert(&key(&t.to_string()), t.to_be_bytes().to_vec(), 0).unwrap();
            }

            prop_assert_eq!(forward.root_hash(), reversed.root_hash());
            prop_assert_eq!(forward.size(), tags.len());
        }

        /// Insert-then-remove returns to the exact prior root, for any base
        /// content and any extra key.
        #[test]
        fn insert_remove_is_identity(
            mut tags in proptest::collection::vec(0u32..5_000, 1..40),
            extra in 5_000u32..6_000,
        ) {
            tags.sort_unstable();
            tags.dedup();

            let mut map = SHAMap::new();
            for t in &tags {
                map.insert(&key(&t.to_string()), t.to_be_bytes().to_vec(), 0).unwrap();
            }
            let root_before = map.root_hash();

            map.insert(&key(&extra.to_string()), b"extra".to_vec(), 0).unwrap();
            prop_assert!(map.remove(&key(&extra.to_string())).unwrap());
            prop_assert_eq!(map.root_hash(), root_before);
            prop_assert_eq!(map.get(&key(&extra.to_string())).unwrap(), None);
        }

        /// Inclusion proofs verify for every member key.
        #[test]
        fn proofs_verify_for_members(mut tags in proptest::collection::vec(0u32..1_000, 1..30)) {
            tags.sort_unstable();
            tags.dedup();

            let mut map = SHAMap::new();
            for t in &tags {
                map.insert(&key(&t.to_string()), t.to_be_bytes().to_vec(), 0).unwrap();
            }
            for t in &tags {
                let proof = map.get_proof(&key(&t.to_string())).unwrap();
                prop_assert!(proof.verify());
                prop_assert_eq!(proof.leaf_data.as_deref(), Some(&t.to_be_bytes()[..]));
            }
        }
    }
}
