//! Node codec: in-memory B+Tree nodes and their single-page encodings.
//!
//! Nodes are plain owned values. They are decoded from a pinned page,
//! the guard is dropped, and the node is worked on without holding any pin.
//! Slots are bounded `Vec`s whose length is the occupied count; no key value
//! is reserved as an "empty" marker.
//!
//! # Internal node body
//! ```text
//! Offset               Size            Field
//! ------               ----            -----
//! 0                    1               level (1 = children are leaves)
//! 1                    2               key_count
//! 3                    4 × MAX_I       keys (i32)
//! 3 + 4 × MAX_I        4 × (MAX_I+1)   children (u32 page ids)
//! ```
//!
//! # Leaf node body
//! ```text
//! Offset               Size            Field
//! ------               ----            -----
//! 0                    2               key_count
//! 2                    4               right_sibling
//! 6                    4 × MAX_L       keys (i32)
//! 6 + 4 × MAX_L        6 × MAX_L       record ids
//! ```

use crate::common::config::{
    INTERNAL_PREFIX_SIZE, KEY_SIZE, LEAF_PREFIX_SIZE, MAX_INTERNAL_CAPACITY, MAX_LEAF_CAPACITY,
    PAGE_ID_SIZE, RECORD_ID_SIZE,
};
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::{Page, PageType};

/// Level flag of an internal node whose children are leaves.
pub const LEVEL_ABOVE_LEAVES: u8 = 1;

/// Level flag of an internal node whose children are internal nodes.
pub const LEVEL_ABOVE_INTERNAL: u8 = 0;

const INTERNAL_KEYS_OFFSET: usize = INTERNAL_PREFIX_SIZE;
const INTERNAL_CHILDREN_OFFSET: usize = INTERNAL_KEYS_OFFSET + KEY_SIZE * MAX_INTERNAL_CAPACITY;

const LEAF_KEYS_OFFSET: usize = LEAF_PREFIX_SIZE;
const LEAF_RIDS_OFFSET: usize = LEAF_KEYS_OFFSET + KEY_SIZE * MAX_LEAF_CAPACITY;

/// A non-leaf node: `keys.len() + 1 == children.len()` always holds.
///
/// Child `i` covers keys `k` with `keys[i-1] <= k <= keys[i]`. A child slot
/// may hold `PageId::INVALID` only above leaves, meaning "leaf not allocated
/// yet".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub level: u8,
    pub keys: Vec<i32>,
    pub children: Vec<PageId>,
}

impl InternalNode {
    /// The root of a freshly bootstrapped index: no keys, one unallocated
    /// leaf slot.
    pub fn empty_root() -> Self {
        Self {
            level: LEVEL_ABOVE_LEAVES,
            keys: Vec::new(),
            children: vec![PageId::INVALID],
        }
    }

    /// A new root placed above two nodes after the old root split.
    pub fn new_root(left: PageId, separator: i32, right: PageId, level: u8) -> Self {
        Self {
            level,
            keys: vec![separator],
            children: vec![left, right],
        }
    }

    #[inline]
    pub fn children_are_leaves(&self) -> bool {
        self.level == LEVEL_ABOVE_LEAVES
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Number of keys `<= key`: the child a search for `key` descends into.
    ///
    /// Equal keys route right, so a new duplicate lands after existing ones.
    #[inline]
    pub fn key_position(&self, key: i32) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// Number of keys `< key`: the leftmost child that can contain `key`.
    #[inline]
    pub fn lower_position(&self, key: i32) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    /// Insert `separator` with `right` as the child just after `child_idx`.
    pub fn insert_after(&mut self, child_idx: usize, separator: i32, right: PageId) {
        self.keys.insert(child_idx, separator);
        self.children.insert(child_idx + 1, right);
    }

    /// Split an over-full node at its median key.
    ///
    /// `self` keeps the lower keys and their children. The returned node gets
    /// the upper keys and children. The median moves up to the parent and
    /// appears in neither half.
    pub fn split(&mut self) -> (i32, InternalNode) {
        let mid = self.keys.len() / 2;
        let upper_keys = self.keys.split_off(mid + 1);
        let median = self.keys[mid];
        self.keys.truncate(mid);
        let upper_children = self.children.split_off(mid + 1);

        let right = InternalNode {
            level: self.level,
            keys: upper_keys,
            children: upper_children,
        };
        (median, right)
    }

    /// Write this node into `page` and seal it as `page_id`.
    ///
    /// # Panics
    /// Panics if the node exceeds `MAX_INTERNAL_CAPACITY` or its child count
    /// is not `key_count + 1`.
    pub fn encode(&self, page: &mut Page, page_id: PageId) {
        assert!(self.keys.len() <= MAX_INTERNAL_CAPACITY, "internal node overflow");
        assert_eq!(self.children.len(), self.keys.len() + 1, "child count mismatch");

        page.reset();
        let body = page.body_mut();
        body[0] = self.level;
        body[1..3].copy_from_slice(&(self.keys.len() as u16).to_le_bytes());

        for (i, key) in self.keys.iter().enumerate() {
            let off = INTERNAL_KEYS_OFFSET + i * KEY_SIZE;
            body[off..off + KEY_SIZE].copy_from_slice(&key.to_le_bytes());
        }
        for (i, child) in self.children.iter().enumerate() {
            let off = INTERNAL_CHILDREN_OFFSET + i * PAGE_ID_SIZE;
            body[off..off + PAGE_ID_SIZE].copy_from_slice(&child.to_le_bytes());
        }

        page.seal(PageType::BTreeInternal, page_id);
    }

    /// Decode the internal node stored on `page`.
    ///
    /// # Errors
    /// `Error::Corrupted` if the page is not a valid internal node page.
    pub fn decode(page: &Page, page_id: PageId) -> Result<Self> {
        page.validate(PageType::BTreeInternal, page_id)?;

        let body = page.body();
        let level = body[0];
        if level != LEVEL_ABOVE_LEAVES && level != LEVEL_ABOVE_INTERNAL {
            return Err(corrupted(page_id, format!("bad level flag {}", level)));
        }
        let count = u16::from_le_bytes([body[1], body[2]]) as usize;
        if count > MAX_INTERNAL_CAPACITY {
            return Err(corrupted(page_id, format!("key count {} exceeds page", count)));
        }

        let keys = (0..count)
            .map(|i| read_i32(body, INTERNAL_KEYS_OFFSET + i * KEY_SIZE))
            .collect();
        let children = (0..=count)
            .map(|i| read_page_id(body, INTERNAL_CHILDREN_OFFSET + i * PAGE_ID_SIZE))
            .collect();

        Ok(Self {
            level,
            keys,
            children,
        })
    }
}

/// A leaf: sorted keys with their record ids and a link to the next leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub keys: Vec<i32>,
    pub rids: Vec<RecordId>,
    pub right_sibling: PageId,
}

impl LeafNode {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            rids: Vec::new(),
            right_sibling: PageId::INVALID,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Insert after every existing entry with an equal key.
    pub fn insert(&mut self, key: i32, rid: RecordId) {
        let pos = self.keys.partition_point(|&k| k <= key);
        self.keys.insert(pos, key);
        self.rids.insert(pos, rid);
    }

    /// Move the upper half of the entries into a new right sibling.
    ///
    /// The new leaf inherits `self.right_sibling`; the caller links `self`
    /// to the new leaf once it has a page id.
    pub fn split(&mut self) -> LeafNode {
        let mid = self.keys.len() / 2;
        LeafNode {
            keys: self.keys.split_off(mid),
            rids: self.rids.split_off(mid),
            right_sibling: self.right_sibling,
        }
    }

    /// First entry `>= key`.
    #[inline]
    pub fn lower_bound(&self, key: i32) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    /// First entry `> key`.
    #[inline]
    pub fn upper_bound(&self, key: i32) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// Write this leaf into `page` and seal it as `page_id`.
    ///
    /// # Panics
    /// Panics if the leaf exceeds `MAX_LEAF_CAPACITY`.
    pub fn encode(&self, page: &mut Page, page_id: PageId) {
        assert!(self.keys.len() <= MAX_LEAF_CAPACITY, "leaf node overflow");
        debug_assert_eq!(self.keys.len(), self.rids.len());

        page.reset();
        let body = page.body_mut();
        body[0..2].copy_from_slice(&(self.keys.len() as u16).to_le_bytes());
        body[2..6].copy_from_slice(&self.right_sibling.to_le_bytes());

        for (i, (key, rid)) in self.keys.iter().zip(&self.rids).enumerate() {
            let off = LEAF_KEYS_OFFSET + i * KEY_SIZE;
            body[off..off + KEY_SIZE].copy_from_slice(&key.to_le_bytes());
            let off = LEAF_RIDS_OFFSET + i * RECORD_ID_SIZE;
            rid.write_to(&mut body[off..off + RECORD_ID_SIZE]);
        }

        page.seal(PageType::BTreeLeaf, page_id);
    }

    /// Decode the leaf stored on `page`.
    ///
    /// # Errors
    /// `Error::Corrupted` if the page is not a valid leaf page.
    pub fn decode(page: &Page, page_id: PageId) -> Result<Self> {
        page.validate(PageType::BTreeLeaf, page_id)?;

        let body = page.body();
        let count = u16::from_le_bytes([body[0], body[1]]) as usize;
        if count > MAX_LEAF_CAPACITY {
            return Err(corrupted(page_id, format!("key count {} exceeds page", count)));
        }

        let keys = (0..count)
            .map(|i| read_i32(body, LEAF_KEYS_OFFSET + i * KEY_SIZE))
            .collect();
        let rids = (0..count)
            .map(|i| {
                let off = LEAF_RIDS_OFFSET + i * RECORD_ID_SIZE;
                RecordId::read_from(&body[off..off + RECORD_ID_SIZE])
            })
            .collect();

        Ok(Self {
            keys,
            rids,
            right_sibling: read_page_id(body, 2),
        })
    }
}

impl Default for LeafNode {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn read_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[inline]
fn read_page_id(buf: &[u8], off: usize) -> PageId {
    PageId::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn corrupted(page_id: PageId, reason: String) -> Error {
    Error::Corrupted { page_id, reason }
}
