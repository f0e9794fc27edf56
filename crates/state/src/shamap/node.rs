// Path: crates/state/src/shamap/node.rs

//! Node definitions for the SHAMap.

use nexaflow_crypto::{sha512_half, Hash256};
use std::cell::Cell;

/// Children per inner node (one per hex nibble).
pub const BRANCH_FACTOR: usize = 16;

/// The hash of an empty branch slot.
pub const EMPTY_HASH: Hash256 = [0u8; 32];

/// A SHAMap node: inner (branch) or leaf.
#[derive(Debug, Clone)]
pub enum Node {
    /// Branch node with up to 16 children.
    Inner(InnerNode),
    /// Leaf storing an object's serialized bytes under its keylet.
    Leaf(LeafNode),
}

impl Node {
    /// The Merkle hash of this node.
    pub fn hash(&self) -> Hash256 {
        match self {
            Node::Inner(inner) => inner.hash(),
            Node::Leaf(leaf) => leaf.hash(),
        }
    }
}

/// A leaf storing an object's serialized data and its keylet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    /// The 32-byte keylet.
    pub key: Hash256,
    /// The canonical serialized object bytes.
    pub data: Vec<u8>,
    /// The `LedgerSpace` discriminant of the stored object.
    pub object_type: u8,
}

impl LeafNode {
    /// `hash = SHA-512-Half(key || data)`.
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(32 + self.data.len());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.data);
        sha512_half(&buf)
    }
}

/// An inner (branch) node with up to 16 children and a lazily cached hash.
#[derive(Debug, Clone, Default)]
pub struct InnerNode {
    /// The child slots, indexed by nibble.
    pub children: [Option<Box<Node>>; BRANCH_FACTOR],
    cached_hash: Cell<Option<Hash256>>,
}

/// What an inner node collapses to after a removal below it.
pub enum Collapse {
    /// The subtree is empty; the parent slot becomes empty.
    Empty,
    /// A single leaf remains; it moves up to the parent slot.
    Single(LeafNode),
    /// More than one child remains; the node stays.
    Keep,
}

impl InnerNode {
    /// `hash = SHA-512-Half(child₀ || child₁ || ... || child₁₅)`, with 32
    /// zero bytes for empty slots. Cached until invalidated.
    pub fn hash(&self) -> Hash256 {
        if let Some(cached) = self.cached_hash.get() {
            return cached;
        }
        let mut buf = Vec::with_capacity(BRANCH_FACTOR * 32);
        for child in &self.children {
            match child {
                Some(node) => buf.extend_from_slice(&node.hash()),
                None => buf.extend_from_slice(&EMPTY_HASH),
            }
        }
        let hash = sha512_half(&buf);
        self.cached_hash.set(Some(hash));
        hash
    }

    /// Drop the cached hash. Called on every mutation along a key's path.
    pub fn invalidate(&self) {
        self.cached_hash.set(None);
    }

    /// Decide whether this node can collapse after a removal beneath it.
    ///
    /// A chain of single-leaf inners collapses upward so that the trie shape
    /// is a pure function of its content: the root hash of a SHAMap depends
    /// only on the (key, data) multi-set, never on operation history.
    pub fn collapse_state(&mut self) -> Collapse {
        let mut occupied = 0usize;
        let mut sole_leaf_slot = None;
        for (idx, child) in self.children.iter().enumerate() {
            match child.as_deref() {
                None => {}
                Some(Node::Leaf(_)) => {
                    occupied += 1;
                    sole_leaf_slot = Some(idx);
                }
                Some(Node::Inner(_)) => {
                    occupied += 1;
                    sole_leaf_slot = None;
                }
            }
            if occupied > 1 {
                return Collapse::Keep;
            }
        }
        match (occupied, sole_leaf_slot) {
            (0, _) => Collapse::Empty,
            (1, Some(idx)) => {
                if let Some(boxed) = self.children[idx].take() {
                    match *boxed {
                        Node::Leaf(leaf) => Collapse::Single(leaf),
                        other => {
                            self.children[idx] = Some(Box::new(other));
                            Collapse::Keep
                        }
                    }
                } else {
                    Collapse::Keep
                }
            }
            _ => Collapse::Keep,
        }
    }
}
