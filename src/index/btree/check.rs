//! Structural integrity walk.
//!
//! Visits every node once, depth first, and checks the invariants the
//! insertion engine maintains: ordered keys, separator bounds, capacities,
//! uniform leaf depth, and a leaf chain that matches the in-order traversal.

use crate::common::{Error, PageId, Result};
use crate::index::btree::node::{InternalNode, LeafNode};
use crate::index::btree::traversal::Tree;

/// Shape of a tree that passed [`Tree::check_integrity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    /// Levels including the leaf level.
    pub height: usize,
    pub internal_count: usize,
    pub leaf_count: usize,
    pub entry_count: usize,
}

/// Inclusive key range a subtree must stay within.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    low: Option<i32>,
    high: Option<i32>,
}

impl Bounds {
    const ALL: Bounds = Bounds {
        low: None,
        high: None,
    };

    fn contains(&self, key: i32) -> bool {
        self.low.map_or(true, |low| key >= low) && self.high.map_or(true, |high| key <= high)
    }

    /// Bounds of child `idx` under `node`.
    fn child(&self, node: &InternalNode, idx: usize) -> Bounds {
        Bounds {
            low: if idx == 0 { self.low } else { Some(node.keys[idx - 1]) },
            high: node.keys.get(idx).copied().or(self.high),
        }
    }
}

#[derive(Default)]
struct Walk {
    stats: TreeStats,
    /// Leaves in in-order traversal order.
    leaves: Vec<PageId>,
    leaf_depth: Option<usize>,
}

impl Tree<'_> {
    /// Walk the whole tree and verify its structure.
    ///
    /// # Errors
    /// `Error::Corrupted` naming the first page that breaks an invariant,
    /// `Error::InvalidPage` for an unallocated internal child.
    pub fn check_integrity(&self) -> Result<TreeStats> {
        let root_id = self.root()?;
        let mut walk = Walk::default();
        self.check_internal(root_id, Bounds::ALL, 1, &mut walk)?;
        self.check_chain(&walk.leaves)?;

        walk.stats.height = match walk.leaf_depth {
            Some(depth) => depth + 1,
            None => self.height()?,
        };
        Ok(walk.stats)
    }

    fn check_internal(&self, page_id: PageId, bounds: Bounds, depth: usize, walk: &mut Walk) -> Result<()> {
        let node = self.read_internal(page_id)?;
        walk.stats.internal_count += 1;

        if node.key_count() > self.internal_capacity {
            return Err(corrupted(page_id, format!("{} keys over capacity", node.key_count())));
        }
        check_keys(page_id, &node.keys, bounds)?;

        for (idx, &child) in node.children.iter().enumerate() {
            let child_bounds = bounds.child(&node, idx);
            if node.children_are_leaves() {
                if child.is_valid() {
                    self.check_leaf(child, child_bounds, depth, walk)?;
                }
            } else if child.is_valid() {
                self.check_internal(child, child_bounds, depth + 1, walk)?;
            } else {
                return Err(Error::InvalidPage(child));
            }
        }
        Ok(())
    }

    fn check_leaf(&self, page_id: PageId, bounds: Bounds, depth: usize, walk: &mut Walk) -> Result<()> {
        let leaf = self.read_leaf(page_id)?;
        if leaf.len() > self.leaf_capacity {
            return Err(corrupted(page_id, format!("{} entries over capacity", leaf.len())));
        }
        check_keys(page_id, &leaf.keys, bounds)?;

        match walk.leaf_depth {
            None => walk.leaf_depth = Some(depth),
            Some(expected) if expected != depth => {
                return Err(corrupted(
                    page_id,
                    format!("leaf at depth {}, expected {}", depth, expected),
                ));
            }
            Some(_) => {}
        }

        walk.stats.leaf_count += 1;
        walk.stats.entry_count += leaf.len();
        walk.leaves.push(page_id);
        Ok(())
    }

    /// The sibling chain from the leftmost leaf must visit exactly `leaves`.
    fn check_chain(&self, leaves: &[PageId]) -> Result<()> {
        let Some(&first) = leaves.first() else {
            return Ok(());
        };

        let mut current = first;
        for (i, &expected) in leaves.iter().enumerate() {
            if current != expected {
                return Err(corrupted(
                    leaves[i.saturating_sub(1)],
                    format!("right sibling is {}, expected {}", current, expected),
                ));
            }
            let LeafNode { right_sibling, .. } = self.read_leaf(current)?;
            current = right_sibling;
        }

        if current.is_valid() {
            return Err(corrupted(
                leaves[leaves.len() - 1],
                format!("last leaf links to {}", current),
            ));
        }
        Ok(())
    }
}

fn check_keys(page_id: PageId, keys: &[i32], bounds: Bounds) -> Result<()> {
    if let Some(pair) = keys.windows(2).find(|w| w[0] > w[1]) {
        return Err(corrupted(page_id, format!("keys out of order: {} > {}", pair[0], pair[1])));
    }
    if let Some(key) = keys.iter().find(|&&k| !bounds.contains(k)) {
        return Err(corrupted(
            page_id,
            format!("key {} outside {:?}..={:?}", key, bounds.low, bounds.high),
        ));
    }
    Ok(())
}

fn corrupted(page_id: PageId, reason: String) -> Error {
    Error::Corrupted { page_id, reason }
}
