//! Range scan cursor.
//!
//! A scan is a half-open or closed interval `low (>|>=) key (<|<=) high`
//! walked in ascending key order along the leaf chain. The cursor remembers
//! only a leaf page id and a slot position, and re-reads the leaf on every
//! step, so no page stays pinned between calls.

use crate::common::{Error, PageId, RecordId, Result};
use crate::index::btree::traversal::Tree;

/// Comparison operator of a scan bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Lte,
    Gte,
    Gt,
}

impl Operator {
    fn is_low(self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte)
    }

    fn is_high(self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte)
    }

    /// Whether `key op bound` holds.
    fn holds(self, key: i32, bound: i32) -> bool {
        match self {
            Operator::Lt => key < bound,
            Operator::Lte => key <= bound,
            Operator::Gte => key >= bound,
            Operator::Gt => key > bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScanState {
    /// `PageId::INVALID` once the leaf chain is exhausted.
    leaf_id: PageId,
    position: usize,
    high: i32,
    high_op: Operator,
}

/// Scan state machine: idle until [`start`](Self::start), executing until
/// exhausted or [`end`](Self::end).
#[derive(Debug, Default)]
pub struct ScanCursor {
    state: Option<ScanState>,
}

impl ScanCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_executing(&self) -> bool {
        self.state.is_some()
    }

    /// Position the cursor on the first entry satisfying `low_op low`.
    ///
    /// Replaces a scan that is already executing. On error the previous state
    /// is left untouched.
    ///
    /// # Errors
    /// - `Error::BadOpcodes` unless `low_op` is `Gt`/`Gte` and `high_op` is
    ///   `Lt`/`Lte`
    /// - `Error::BadScanRange` if `low > high`
    pub fn start(
        &mut self,
        tree: &Tree,
        low: i32,
        low_op: Operator,
        high: i32,
        high_op: Operator,
    ) -> Result<()> {
        if !low_op.is_low() || !high_op.is_high() {
            return Err(Error::BadOpcodes);
        }
        if low > high {
            return Err(Error::BadScanRange { low, high });
        }

        let (leaf_id, position) = seek(tree, low, low_op)?;
        self.state = Some(ScanState {
            leaf_id,
            position,
            high,
            high_op,
        });
        Ok(())
    }

    /// Record id of the next matching entry.
    ///
    /// # Errors
    /// - `Error::ScanNotInitialized` if no scan is executing
    /// - `Error::IndexScanCompleted` once no entry is left within the high
    ///   bound; the cursor is idle afterwards
    pub fn next(&mut self, tree: &Tree) -> Result<RecordId> {
        let mut state = self.state.take().ok_or(Error::ScanNotInitialized)?;
        match advance(tree, &mut state) {
            Ok(Some(rid)) => {
                self.state = Some(state);
                Ok(rid)
            }
            Ok(None) => Err(Error::IndexScanCompleted),
            Err(e) => {
                self.state = Some(state);
                Err(e)
            }
        }
    }

    /// # Errors
    /// `Error::ScanNotInitialized` if no scan is executing.
    pub fn end(&mut self) -> Result<()> {
        self.state.take().map(|_| ()).ok_or(Error::ScanNotInitialized)
    }
}

impl Tree<'_> {
    /// Every record id stored under `key`, in insertion order.
    pub fn lookup(&self, key: i32) -> Result<Vec<RecordId>> {
        let mut cursor = ScanCursor::new();
        cursor.start(self, key, Operator::Gte, key, Operator::Lte)?;

        let mut rids = Vec::new();
        loop {
            match cursor.next(self) {
                Ok(rid) => rids.push(rid),
                Err(Error::IndexScanCompleted) => return Ok(rids),
                Err(e) => return Err(e),
            }
        }
    }
}

/// First `(leaf, position)` satisfying `op low`, or an exhausted position.
fn seek(tree: &Tree, low: i32, op: Operator) -> Result<(PageId, usize)> {
    let pos = match op {
        Operator::Gte => tree.find_leaf_lower(low)?,
        _ => tree.find_leaf(low)?,
    }
    .into_position();

    let mut leaf_id = pos.leaf_id;
    let mut leaf = pos.leaf;
    loop {
        let position = match op {
            Operator::Gte => leaf.lower_bound(low),
            _ => leaf.upper_bound(low),
        };
        if position < leaf.len() {
            return Ok((leaf_id, position));
        }
        leaf_id = leaf.right_sibling;
        if !leaf_id.is_valid() {
            return Ok((PageId::INVALID, 0));
        }
        leaf = tree.read_leaf(leaf_id)?;
    }
}

/// Return the entry under the cursor if it is within the high bound and step
/// past it. `None` means the scan is over.
fn advance(tree: &Tree, state: &mut ScanState) -> Result<Option<RecordId>> {
    while state.leaf_id.is_valid() {
        let leaf = tree.read_leaf(state.leaf_id)?;
        if state.position < leaf.len() {
            let key = leaf.keys[state.position];
            if !state.high_op.holds(key, state.high) {
                return Ok(None);
            }
            state.position += 1;
            return Ok(Some(leaf.rids[state.position - 1]));
        }
        state.leaf_id = leaf.right_sibling;
        state.position = 0;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::index::btree::meta::{Datatype, IndexMetadata, MetadataStore};
    use crate::storage::DiskManager;
    use tempfile::{tempdir, TempDir};

    fn create_bpm() -> (BufferPoolManager, TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("rel.0"))
            .unwrap()
            .with_sync_writes(false);
        let bpm = BufferPoolManager::new(16, dm);
        MetadataStore::new(&bpm)
            .bootstrap(&IndexMetadata {
                relation_name: "rel".to_string(),
                attr_byte_offset: 0,
                attr_type: Datatype::Integer,
                root_page_id: PageId::INVALID,
                leaf_capacity: 2,
                internal_capacity: 2,
            })
            .unwrap();
        (bpm, dir)
    }

    fn rid(key: i32) -> RecordId {
        RecordId::new(PageId::new(key as u32), 0)
    }

    fn collect(cursor: &mut ScanCursor, tree: &Tree) -> Vec<i32> {
        let mut keys = Vec::new();
        loop {
            match cursor.next(tree) {
                Ok(rid) => keys.push(rid.page_id.0 as i32),
                Err(Error::IndexScanCompleted) => return keys,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    fn populated<'a>(bpm: &'a BufferPoolManager, keys: &[i32]) -> Tree<'a> {
        let tree = Tree::new(bpm, 2, 2);
        for &k in keys {
            tree.insert(k, rid(k)).unwrap();
        }
        tree
    }

    #[test]
    fn test_operator_bounds() {
        let (bpm, _dir) = create_bpm();
        let tree = populated(&bpm, &[3, 5, 7, 9, 11, 13]);
        let mut cursor = ScanCursor::new();

        cursor.start(&tree, 5, Operator::Gt, 11, Operator::Lt).unwrap();
        assert_eq!(collect(&mut cursor, &tree), vec![7, 9]);

        cursor.start(&tree, 5, Operator::Gte, 11, Operator::Lte).unwrap();
        assert_eq!(collect(&mut cursor, &tree), vec![5, 7, 9, 11]);

        cursor.start(&tree, 4, Operator::Gt, 12, Operator::Lt).unwrap();
        assert_eq!(collect(&mut cursor, &tree), vec![5, 7, 9, 11]);

        cursor.start(&tree, i32::MIN, Operator::Gte, i32::MAX, Operator::Lte).unwrap();
        assert_eq!(collect(&mut cursor, &tree), vec![3, 5, 7, 9, 11, 13]);
    }

    #[test]
    fn test_completion_resets_cursor() {
        let (bpm, _dir) = create_bpm();
        let tree = populated(&bpm, &[1, 2]);
        let mut cursor = ScanCursor::new();

        cursor.start(&tree, 2, Operator::Gte, 2, Operator::Lte).unwrap();
        assert_eq!(cursor.next(&tree).unwrap(), rid(2));
        assert!(matches!(cursor.next(&tree), Err(Error::IndexScanCompleted)));
        assert!(!cursor.is_executing());
        assert!(matches!(cursor.next(&tree), Err(Error::ScanNotInitialized)));
        assert!(matches!(cursor.end(), Err(Error::ScanNotInitialized)));
    }

    #[test]
    fn test_scan_past_last_key_is_empty() {
        let (bpm, _dir) = create_bpm();
        let tree = populated(&bpm, &[1, 2, 3]);
        let mut cursor = ScanCursor::new();

        cursor.start(&tree, 3, Operator::Gt, 100, Operator::Lte).unwrap();
        assert!(cursor.is_executing());
        assert!(matches!(cursor.next(&tree), Err(Error::IndexScanCompleted)));
    }

    #[test]
    fn test_bad_opcodes_leave_state_unchanged() {
        let (bpm, _dir) = create_bpm();
        let tree = populated(&bpm, &[1, 2, 3]);
        let mut cursor = ScanCursor::new();

        cursor.start(&tree, 1, Operator::Gte, 3, Operator::Lte).unwrap();
        assert!(matches!(
            cursor.start(&tree, 1, Operator::Lt, 3, Operator::Lte),
            Err(Error::BadOpcodes)
        ));
        assert!(matches!(
            cursor.start(&tree, 1, Operator::Gte, 3, Operator::Gt),
            Err(Error::BadOpcodes)
        ));
        assert!(matches!(
            cursor.start(&tree, 9, Operator::Gt, 3, Operator::Lt),
            Err(Error::BadScanRange { low: 9, high: 3 })
        ));

        assert_eq!(collect(&mut cursor, &tree), vec![1, 2, 3]);
    }

    #[test]
    fn test_lookup_spans_leaves() {
        let (bpm, _dir) = create_bpm();
        let tree = Tree::new(&bpm, 2, 2);
        tree.insert(1, rid(1)).unwrap();
        for slot in 0..7 {
            tree.insert(4, RecordId::new(PageId::new(4), slot)).unwrap();
        }
        tree.insert(8, rid(8)).unwrap();

        let rids = tree.lookup(4).unwrap();
        assert_eq!(
            rids.iter().map(|r| r.slot).collect::<Vec<_>>(),
            (0..7u16).collect::<Vec<_>>()
        );
        assert!(tree.lookup(5).unwrap().is_empty());
        assert_eq!(bpm.pinned_page_count(), 0);
    }
}
