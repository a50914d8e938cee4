//! Insertion engine: leaf insert, splits, separator promotion, root growth.

use log::debug;

use crate::common::{PageId, RecordId, Result};
use crate::index::btree::meta::MetadataStore;
use crate::index::btree::node::{InternalNode, LeafNode, LEVEL_ABOVE_INTERNAL};
use crate::index::btree::traversal::{PathStep, Tree};

impl Tree<'_> {
    /// Insert `(key, rid)`, after any entries already stored under `key`.
    pub fn insert(&self, key: i32, rid: RecordId) -> Result<()> {
        let root_id = self.root()?;
        let root = self.read_internal(root_id)?;
        if root.keys.is_empty() && !root.children[0].is_valid() {
            return self.insert_first(root_id, root, key, rid);
        }

        let pos = self.find_leaf(key)?.into_position();
        let mut leaf = pos.leaf;
        leaf.insert(key, rid);
        if leaf.len() <= self.leaf_capacity {
            return self.write_leaf(pos.leaf_id, &leaf);
        }

        let right = leaf.split();
        let separator = right.keys[0];
        let right_id = self.allocate_leaf(&right)?;
        leaf.right_sibling = right_id;
        self.write_leaf(pos.leaf_id, &leaf)?;

        debug!(
            "split leaf {} at key {}: {} + {} entries, new leaf {}",
            pos.leaf_id,
            separator,
            leaf.len(),
            right.len(),
            right_id
        );
        self.promote(pos.path, separator, right_id)
    }

    /// The very first entry: one leaf to the right of the root's only key.
    ///
    /// The root keeps its page id. Its left slot stays unallocated until a
    /// smaller key arrives.
    fn insert_first(&self, root_id: PageId, mut root: InternalNode, key: i32, rid: RecordId) -> Result<()> {
        let mut leaf = LeafNode::new();
        leaf.insert(key, rid);
        let leaf_id = self.allocate_leaf(&leaf)?;

        root.keys = vec![key];
        root.children = vec![PageId::INVALID, leaf_id];
        self.write_internal(root_id, &root)?;

        MetadataStore::new(self.bpm).set_root(root_id)?;
        debug!("initialized tree: root {}, first leaf {}", root_id, leaf_id);
        Ok(())
    }

    /// Push `(separator, right_id)` into the parents recorded in `path`,
    /// splitting each parent that overflows.
    fn promote(&self, mut path: Vec<PathStep>, mut separator: i32, mut right_id: PageId) -> Result<()> {
        let mut split_id = PageId::INVALID;

        while let Some(step) = path.pop() {
            let mut node = self.read_internal(step.page_id)?;
            node.insert_after(step.child_idx, separator, right_id);
            if node.key_count() <= self.internal_capacity {
                return self.write_internal(step.page_id, &node);
            }

            let (median, sibling) = node.split();
            let sibling_id = self.allocate_internal(&sibling)?;
            self.write_internal(step.page_id, &node)?;

            debug!(
                "split internal {} at key {}: {} + {} keys, new node {}",
                step.page_id,
                median,
                node.key_count(),
                sibling.key_count(),
                sibling_id
            );
            separator = median;
            right_id = sibling_id;
            split_id = step.page_id;
        }

        self.grow_root(split_id, separator, right_id)
    }

    /// The old root split into `old_root` and `right_id`: put a new root above
    /// them. The only place the tree gains height.
    fn grow_root(&self, old_root: PageId, separator: i32, right_id: PageId) -> Result<()> {
        let root = InternalNode::new_root(old_root, separator, right_id, LEVEL_ABOVE_INTERNAL);
        let root_id = self.allocate_internal(&root)?;
        MetadataStore::new(self.bpm).set_root(root_id)?;

        debug!(
            "root split: new root {} over {} and {} (separator {})",
            root_id, old_root, right_id, separator
        );
        Ok(())
    }
}
