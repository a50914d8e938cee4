//! Traversal engine: root-to-leaf descent.
//!
//! Every step pins one page, decodes the node and unpins it before the next
//! level is touched. The only state carried down is the path of
//! `(page id, child index)` pairs, which the insertion engine walks back up
//! when a split has to be promoted.

use log::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, Result};
use crate::index::btree::meta::MetadataStore;
use crate::index::btree::node::{InternalNode, LeafNode};

/// Upper bound on internal levels. Far above any reachable height; hitting it
/// means a cycle in the child pointers.
const MAX_DEPTH: usize = 64;

/// One internal node visited on the way down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub page_id: PageId,
    pub child_idx: usize,
}

/// The leaf a descent ended at, plus how it got there.
#[derive(Debug, Clone)]
pub struct LeafPosition {
    pub leaf_id: PageId,
    pub leaf: LeafNode,
    /// Root first.
    pub path: Vec<PathStep>,
}

/// Outcome of [`Tree::find_leaf`].
#[derive(Debug)]
pub enum Descent {
    /// The leaf already existed.
    Found(LeafPosition),
    /// The child slot was unallocated; an empty leaf was created in its place.
    Created(LeafPosition),
}

impl Descent {
    pub fn into_position(self) -> LeafPosition {
        match self {
            Descent::Found(pos) | Descent::Created(pos) => pos,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Descent::Created(_))
    }
}

/// How a search key picks a child when separators equal it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bias {
    /// Count keys `<= key`: the rightmost child that can hold `key`.
    Upper,
    /// Count keys `< key`: the leftmost child that can hold `key`.
    Lower,
}

/// A view of one index file's tree over its buffer pool.
///
/// Cheap to build; holds no pins and no cached nodes.
#[derive(Clone, Copy)]
pub struct Tree<'a> {
    pub(crate) bpm: &'a BufferPoolManager,
    pub(crate) leaf_capacity: usize,
    pub(crate) internal_capacity: usize,
}

impl<'a> Tree<'a> {
    pub fn new(bpm: &'a BufferPoolManager, leaf_capacity: usize, internal_capacity: usize) -> Self {
        Self {
            bpm,
            leaf_capacity,
            internal_capacity,
        }
    }

    pub fn root(&self) -> Result<PageId> {
        MetadataStore::new(self.bpm).get_root()
    }

    /// Descend to the leaf an insertion of `key` belongs in.
    ///
    /// Equal separators route right, so the leaf returned is the last one
    /// that may hold `key`.
    ///
    /// # Errors
    /// `Error::InvalidPage` if a child slot is out of range or an internal
    /// child is unallocated.
    pub fn find_leaf(&self, key: i32) -> Result<Descent> {
        self.descend(key, Bias::Upper)
    }

    /// Descend to the first leaf that may hold `key`.
    pub fn find_leaf_lower(&self, key: i32) -> Result<Descent> {
        self.descend(key, Bias::Lower)
    }

    /// Number of levels including the leaf level.
    ///
    /// A root that only points at leaves gives 2.
    pub fn height(&self) -> Result<usize> {
        let mut page_id = self.root()?;
        for levels in 1..=MAX_DEPTH {
            let node = self.read_internal(page_id)?;
            if node.children_are_leaves() {
                return Ok(levels + 1);
            }
            page_id = node.children[0];
            if !page_id.is_valid() {
                return Err(Error::InvalidPage(page_id));
            }
        }
        Err(too_deep(page_id))
    }

    fn descend(&self, key: i32, bias: Bias) -> Result<Descent> {
        let mut page_id = self.root()?;
        let mut path = Vec::new();

        while path.len() < MAX_DEPTH {
            let node = self.read_internal(page_id)?;
            let child_idx = match bias {
                Bias::Upper => node.key_position(key),
                Bias::Lower => node.lower_position(key),
            };
            let child = *node
                .children
                .get(child_idx)
                .ok_or(Error::InvalidPage(page_id))?;
            path.push(PathStep { page_id, child_idx });

            if node.children_are_leaves() {
                if !child.is_valid() {
                    let (leaf_id, leaf) = self.create_leaf(page_id, node, child_idx)?;
                    return Ok(Descent::Created(LeafPosition {
                        leaf_id,
                        leaf,
                        path,
                    }));
                }
                let leaf = self.read_leaf(child)?;
                return Ok(Descent::Found(LeafPosition {
                    leaf_id: child,
                    leaf,
                    path,
                }));
            }

            if !child.is_valid() {
                return Err(Error::InvalidPage(child));
            }
            page_id = child;
        }

        Err(too_deep(page_id))
    }

    /// Allocate an empty leaf for the unallocated slot `child_idx` of
    /// `parent` and splice it into the sibling chain.
    fn create_leaf(
        &self,
        parent_id: PageId,
        mut parent: InternalNode,
        child_idx: usize,
    ) -> Result<(PageId, LeafNode)> {
        let leaf = LeafNode {
            right_sibling: parent
                .children
                .get(child_idx + 1)
                .copied()
                .unwrap_or(PageId::INVALID),
            ..LeafNode::new()
        };
        let leaf_id = self.allocate_leaf(&leaf)?;

        if child_idx > 0 && parent.children[child_idx - 1].is_valid() {
            let left_id = parent.children[child_idx - 1];
            let mut left = self.read_leaf(left_id)?;
            left.right_sibling = leaf_id;
            self.write_leaf(left_id, &left)?;
        }

        parent.children[child_idx] = leaf_id;
        self.write_internal(parent_id, &parent)?;

        debug!("created leaf {} in slot {} of {}", leaf_id, child_idx, parent_id);
        Ok((leaf_id, leaf))
    }

    // ========================================================================
    // Node I/O
    // ========================================================================

    pub fn read_internal(&self, page_id: PageId) -> Result<InternalNode> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        InternalNode::decode(&guard, page_id)
    }

    pub fn read_leaf(&self, page_id: PageId) -> Result<LeafNode> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        LeafNode::decode(&guard, page_id)
    }

    pub(crate) fn write_internal(&self, page_id: PageId, node: &InternalNode) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(page_id)?;
        node.encode(&mut guard, page_id);
        Ok(())
    }

    pub(crate) fn write_leaf(&self, page_id: PageId, leaf: &LeafNode) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(page_id)?;
        leaf.encode(&mut guard, page_id);
        Ok(())
    }

    pub(crate) fn allocate_internal(&self, node: &InternalNode) -> Result<PageId> {
        let mut guard = self.bpm.new_page()?;
        let page_id = guard.page_id();
        node.encode(&mut guard, page_id);
        Ok(page_id)
    }

    pub(crate) fn allocate_leaf(&self, leaf: &LeafNode) -> Result<PageId> {
        let mut guard = self.bpm.new_page()?;
        let page_id = guard.page_id();
        leaf.encode(&mut guard, page_id);
        Ok(page_id)
    }
}

fn too_deep(page_id: PageId) -> Error {
    Error::Corrupted {
        page_id,
        reason: format!("descent exceeded {} levels", MAX_DEPTH),
    }
}
