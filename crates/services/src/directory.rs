// Path: crates/services/src/directory.rs

//! Directory nodes: paged indices of ledger objects.
//!
//! Owner directories index everything an account owns (trust lines,
//! offers, escrows, channels, checks, tokens, ...) so owned objects can be
//! enumerated without scanning the whole ledger. Offer directories index
//! DEX offers per currency pair. Pages hold up to 32 entries and chain
//! through next/prev links.

use nexaflow_types::app::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entries per directory page.
pub const PAGE_SIZE: usize = 32;

/// The kind of object a directory entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ObjectType {
    TrustLine,
    Offer,
    Escrow,
    PaymentChannel,
    Check,
    Nftoken,
    NftokenOffer,
    Ticket,
    Did,
    Credential,
    Hook,
    Mpt,
    Oracle,
    SignerList,
    Bridge,
}

/// A single entry in a directory page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// The referenced object's id.
    pub object_id: String,
    /// The referenced object's kind.
    pub object_type: ObjectType,
}

/// A page in a directory chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// The directory this page belongs to.
    pub directory_id: String,
    /// Position in the chain, starting at 0.
    pub page_index: u32,
    /// Up to [`PAGE_SIZE`] entries.
    pub entries: Vec<DirectoryEntry>,
    /// The next page, when this one overflowed.
    pub next_page: Option<Box<DirectoryNode>>,
}

impl DirectoryNode {
    fn new(directory_id: &str, page_index: u32) -> Self {
        Self {
            directory_id: directory_id.to_owned(),
            page_index,
            entries: Vec::new(),
            next_page: None,
        }
    }

    /// Whether this page is at capacity.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= PAGE_SIZE
    }

    /// Append an entry to the first non-full page, allocating a new page at
    /// the end of the chain when needed.
    pub fn add(&mut self, entry: DirectoryEntry) {
        if !self.is_full() {
            self.entries.push(entry);
            return;
        }
        let directory_id = self.directory_id.clone();
        let next_index = self.page_index + 1;
        self.next_page
            .get_or_insert_with(|| Box::new(DirectoryNode::new(&directory_id, next_index)))
            .add(entry);
    }

    /// Remove an entry by object id anywhere in the chain.
    pub fn remove(&mut self, object_id: &str) -> bool {
        if let Some(pos) = self.entries.iter().position(|e| e.object_id == object_id) {
            self.entries.remove(pos);
            return true;
        }
        self.next_page
            .as_mut()
            .map(|next| next.remove(object_id))
            .unwrap_or(false)
    }

    /// Find an entry by object id anywhere in the chain.
    pub fn find(&self, object_id: &str) -> Option<&DirectoryEntry> {
        self.entries
            .iter()
            .find(|e| e.object_id == object_id)
            .or_else(|| self.next_page.as_ref().and_then(|next| next.find(object_id)))
    }

    /// All entries across the chain, in page order.
    pub fn all_entries(&self) -> Vec<&DirectoryEntry> {
        let mut out: Vec<&DirectoryEntry> = self.entries.iter().collect();
        if let Some(next) = &self.next_page {
            out.extend(next.all_entries());
        }
        out
    }

    /// Total entries across the chain.
    pub fn total_count(&self) -> usize {
        self.entries.len()
            + self
                .next_page
                .as_ref()
                .map(|next| next.total_count())
                .unwrap_or(0)
    }

    /// Number of pages in the chain.
    pub fn page_count(&self) -> usize {
        1 + self
            .next_page
            .as_ref()
            .map(|next| next.page_count())
            .unwrap_or(0)
    }
}

/// The owner directory of a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerDirectory {
    /// The owning account.
    pub owner: Address,
    root: DirectoryNode,
    by_type: BTreeMap<ObjectType, Vec<String>>,
}

impl OwnerDirectory {
    /// An empty directory for `owner`.
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            root: DirectoryNode::new(&format!("owner:{}", owner), 0),
            by_type: BTreeMap::new(),
        }
    }

    /// Total owned objects; matches the account's `owner_count`.
    pub fn owner_count(&self) -> usize {
        self.root.total_count()
    }

    /// Index a newly owned object.
    pub fn add_object(&mut self, object_id: &str, object_type: ObjectType) {
        self.root.add(DirectoryEntry {
            object_id: object_id.to_owned(),
            object_type,
        });
        self.by_type
            .entry(object_type)
            .or_default()
            .push(object_id.to_owned());
    }

    /// Drop an owned object from the index. Returns whether it was present.
    pub fn remove_object(&mut self, object_id: &str) -> bool {
        let found = self.root.remove(object_id);
        if found {
            for ids in self.by_type.values_mut() {
                if let Some(pos) = ids.iter().position(|id| id == object_id) {
                    ids.remove(pos);
                    break;
                }
            }
        }
        found
    }

    /// Owned objects, optionally filtered by type.
    pub fn objects(&self, object_type: Option<ObjectType>) -> Vec<&DirectoryEntry> {
        match object_type {
            None => self.root.all_entries(),
            Some(wanted) => self
                .root
                .all_entries()
                .into_iter()
                .filter(|e| e.object_type == wanted)
                .collect(),
        }
    }

    /// Ids of owned objects of a given type.
    pub fn object_ids(&self, object_type: ObjectType) -> &[String] {
        self.by_type
            .get(&object_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether the account owns this object.
    pub fn has_object(&self, object_id: &str) -> bool {
        self.root.find(object_id).is_some()
    }

    /// Pages currently in the chain.
    pub fn page_count(&self) -> usize {
        self.root.page_count()
    }
}

/// Per-pair index of DEX offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferDirectory {
    /// The currency pair, `"{pays}/{gets}"`.
    pub pair: String,
    root: DirectoryNode,
}

impl OfferDirectory {
    /// An empty directory for `pair`.
    pub fn new(pair: &str) -> Self {
        Self {
            pair: pair.to_owned(),
            root: DirectoryNode::new(&format!("offers:{}", pair), 0),
        }
    }

    /// Index an offer.
    pub fn add_offer(&mut self, offer_id: &str) {
        self.root.add(DirectoryEntry {
            object_id: offer_id.to_owned(),
            object_type: ObjectType::Offer,
        });
    }

    /// Drop an offer from the index.
    pub fn remove_offer(&mut self, offer_id: &str) -> bool {
        self.root.remove(offer_id)
    }

    /// All indexed offer ids.
    pub fn offer_ids(&self) -> Vec<&str> {
        self.root
            .all_entries()
            .into_iter()
            .map(|e| e.object_id.as_str())
            .collect()
    }

    /// Number of indexed offers.
    pub fn count(&self) -> usize {
        self.root.total_count()
    }
}

/// Top-level manager for all owner and offer directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryManager {
    owner_dirs: BTreeMap<Address, OwnerDirectory>,
    offer_dirs: BTreeMap<String, OfferDirectory>,
}

impl DirectoryManager {
    /// Get or create the owner directory of an account.
    pub fn owner_dir_mut(&mut self, owner: &str) -> &mut OwnerDirectory {
        self.owner_dirs
            .entry(owner.to_owned())
            .or_insert_with(|| OwnerDirectory::new(owner))
    }

    /// The owner directory of an account, if it exists.
    pub fn owner_dir(&self, owner: &str) -> Option<&OwnerDirectory> {
        self.owner_dirs.get(owner)
    }

    /// Get or create the offer directory of a pair.
    pub fn offer_dir_mut(&mut self, pair: &str) -> &mut OfferDirectory {
        self.offer_dirs
            .entry(pair.to_owned())
            .or_insert_with(|| OfferDirectory::new(pair))
    }

    /// The offer directory of a pair, if it exists.
    pub fn offer_dir(&self, pair: &str) -> Option<&OfferDirectory> {
        self.offer_dirs.get(pair)
    }

    /// Index a newly owned object.
    pub fn add_owned_object(&mut self, owner: &str, object_id: &str, object_type: ObjectType) {
        self.owner_dir_mut(owner).add_object(object_id, object_type);
    }

    /// Drop an owned object. Returns whether it was present.
    pub fn remove_owned_object(&mut self, owner: &str, object_id: &str) -> bool {
        self.owner_dirs
            .get_mut(owner)
            .map(|dir| dir.remove_object(object_id))
            .unwrap_or(false)
    }

    /// Total objects owned by an account.
    pub fn owner_count(&self, owner: &str) -> usize {
        self.owner_dirs
            .get(owner)
            .map(OwnerDirectory::owner_count)
            .unwrap_or(0)
    }

    /// Drop every directory (used before a rebuild).
    pub fn clear(&mut self) {
        self.owner_dirs.clear();
        self.offer_dirs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_overflow_at_32_entries() {
        let mut dir = OwnerDirectory::new("alice");
        for i in 0..(PAGE_SIZE + 3) {
            dir.add_object(&format!("esc{}", i), ObjectType::Escrow);
        }
        assert_eq!(dir.owner_count(), PAGE_SIZE + 3);
        assert_eq!(dir.page_count(), 2);
        // Entries stay enumerable across pages.
        assert!(dir.has_object("esc33"));
    }

    #[test]
    fn removal_works_across_pages_and_refills() {
        let mut dir = OwnerDirectory::new("alice");
        for i in 0..40 {
            dir.add_object(&format!("o{}", i), ObjectType::Offer);
        }
        assert!(dir.remove_object("o35")); // lives on page 1
        assert!(!dir.remove_object("o35"));
        assert_eq!(dir.owner_count(), 39);

        // A new entry fills the hole on the first non-full page.
        dir.add_object("new", ObjectType::Offer);
        assert_eq!(dir.owner_count(), 40);
    }

    #[test]
    fn type_filters() {
        let mut dir = OwnerDirectory::new("alice");
        dir.add_object("t1", ObjectType::TrustLine);
        dir.add_object("e1", ObjectType::Escrow);
        dir.add_object("e2", ObjectType::Escrow);
        assert_eq!(dir.objects(Some(ObjectType::Escrow)).len(), 2);
        assert_eq!(dir.object_ids(ObjectType::TrustLine), ["t1".to_string()]);
        assert_eq!(dir.objects(None).len(), 3);
    }

    #[test]
    fn manager_tracks_owner_counts() {
        let mut mgr = DirectoryManager::default();
        mgr.add_owned_object("alice", "e1", ObjectType::Escrow);
        mgr.add_owned_object("alice", "c1", ObjectType::Check);
        mgr.add_owned_object("bob", "e2", ObjectType::Escrow);
        assert_eq!(mgr.owner_count("alice"), 2);
        assert_eq!(mgr.owner_count("bob"), 1);
        assert!(mgr.remove_owned_object("alice", "e1"));
        assert_eq!(mgr.owner_count("alice"), 1);
        assert_eq!(mgr.owner_count("nobody"), 0);
    }

    #[test]
    fn offer_directory_indexes_per_pair() {
        let mut mgr = DirectoryManager::default();
        mgr.offer_dir_mut("USD/NXF").add_offer("o1");
        mgr.offer_dir_mut("USD/NXF").add_offer("o2");
        mgr.offer_dir_mut("EUR/NXF").add_offer("o3");
        assert_eq!(mgr.offer_dir("USD/NXF").unwrap().count(), 2);
        assert_eq!(mgr.offer_dir("EUR/NXF").unwrap().count(), 1);
        assert!(mgr.offer_dir_mut("USD/NXF").remove_offer("o1"));
        assert_eq!(mgr.offer_dir("USD/NXF").unwrap().offer_ids(), ["o2"]);
    }
}
