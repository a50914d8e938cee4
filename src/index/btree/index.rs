//! The index handle: construction, bulk load and the public operations.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::buffer::BufferPoolManager;
use crate::common::config::IndexConfig;
use crate::common::{Error, PageId, RecordId, Result};
use crate::index::btree::check::TreeStats;
use crate::index::btree::meta::{Datatype, IndexMetadata, MetadataStore, MAX_RELATION_NAME_LEN};
use crate::index::btree::scan::{Operator, ScanCursor};
use crate::index::btree::traversal::Tree;
use crate::storage::DiskManager;

/// Source of the records a new index is populated from.
///
/// Read once, when the index file is first created. Any iterator of
/// `Result<(RecordId, Vec<u8>)>` is a `RelationScan`.
pub trait RelationScan {
    /// The next record and its location, or `None` when the relation is
    /// exhausted.
    fn next_record(&mut self) -> Option<Result<(RecordId, Vec<u8>)>>;
}

impl<I> RelationScan for I
where
    I: Iterator<Item = Result<(RecordId, Vec<u8>)>>,
{
    fn next_record(&mut self) -> Option<Result<(RecordId, Vec<u8>)>> {
        self.next()
    }
}

/// Name of the index file for `relation_name`'s attribute at
/// `attr_byte_offset`.
///
/// ```
/// assert_eq!(keyspan::index_file_name("orders", 12), "orders.12");
/// ```
pub fn index_file_name(relation_name: &str, attr_byte_offset: u32) -> String {
    format!("{}.{}", relation_name, attr_byte_offset)
}

/// A B+Tree secondary index over one integer attribute of a relation.
///
/// Owns the buffer pool of its index file. All state other than the scan
/// cursor lives in that file.
///
/// Dropping the index ends any executing scan and flushes every dirty page.
pub struct BTreeIndex {
    bpm: BufferPoolManager,
    path: PathBuf,
    file_name: String,
    leaf_capacity: usize,
    internal_capacity: usize,
    cursor: ScanCursor,
}

impl BTreeIndex {
    /// Open the index on `relation_name`'s attribute at `attr_byte_offset`,
    /// creating it under `dir` if it does not exist.
    ///
    /// A new index file is bootstrapped and populated from `scan`, reading
    /// each record's key as a little-endian `i32` at `attr_byte_offset`. An
    /// existing file is checked against the requested identity and
    /// capacities; `scan` is not read.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `config` fails validation
    /// - `Error::UnsupportedAttributeType` for anything but `Integer`
    /// - `Error::RelationNameTooLong` past 64 bytes
    /// - `Error::BadIndexInfo` if an existing file was built differently
    /// - `Error::RecordTooShort` if a scanned record has no key at the offset
    pub fn construct<P: AsRef<Path>, S: RelationScan>(
        dir: P,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: Datatype,
        scan: S,
        config: IndexConfig,
    ) -> Result<Self> {
        config.validate()?;
        if attr_type != Datatype::Integer {
            return Err(Error::UnsupportedAttributeType(attr_type));
        }
        if relation_name.len() > MAX_RELATION_NAME_LEN {
            return Err(Error::RelationNameTooLong(relation_name.len()));
        }

        let file_name = index_file_name(relation_name, attr_byte_offset);
        let path = dir.as_ref().join(&file_name);
        let requested = IndexMetadata {
            relation_name: relation_name.to_string(),
            attr_byte_offset,
            attr_type,
            root_page_id: PageId::INVALID,
            leaf_capacity: config.leaf_capacity as u16,
            internal_capacity: config.internal_capacity as u16,
        };

        match DiskManager::open(&path) {
            Ok(dm) => {
                let index = Self::with_disk_manager(dm, path, file_name, &config);
                index.verify_existing(&requested)?;
                info!("opened index {}", index.path.display());
                Ok(index)
            }
            Err(Error::FileNotFound(_)) => {
                let dm = DiskManager::create(&path)?;
                let mut index = Self::with_disk_manager(dm, path.clone(), file_name, &config);
                if let Err(e) = index.build(&requested, scan) {
                    drop(index);
                    if let Err(rm) = fs::remove_file(&path) {
                        warn!("could not remove partial index {}: {}", path.display(), rm);
                    }
                    return Err(e);
                }
                Ok(index)
            }
            Err(e) => Err(e),
        }
    }

    fn with_disk_manager(dm: DiskManager, path: PathBuf, file_name: String, config: &IndexConfig) -> Self {
        let dm = dm.with_sync_writes(config.sync_writes);
        Self {
            bpm: BufferPoolManager::new(config.pool_size, dm),
            path,
            file_name,
            leaf_capacity: config.leaf_capacity,
            internal_capacity: config.internal_capacity,
            cursor: ScanCursor::new(),
        }
    }

    fn verify_existing(&self, requested: &IndexMetadata) -> Result<()> {
        let store = MetadataStore::new(&self.bpm);
        store.check_file_header()?;

        if !store.verify(&requested.relation_name, requested.attr_byte_offset, requested.attr_type)? {
            let stored = store.read()?;
            return Err(Error::BadIndexInfo(format!(
                "file is for {}@{} ({:?}), requested {}@{} ({:?})",
                stored.relation_name,
                stored.attr_byte_offset,
                stored.attr_type,
                requested.relation_name,
                requested.attr_byte_offset,
                requested.attr_type
            )));
        }

        let stored = store.read()?;
        if stored.leaf_capacity != requested.leaf_capacity
            || stored.internal_capacity != requested.internal_capacity
        {
            return Err(Error::BadIndexInfo(format!(
                "file has capacities {}/{}, requested {}/{}",
                stored.leaf_capacity,
                stored.internal_capacity,
                requested.leaf_capacity,
                requested.internal_capacity
            )));
        }
        Ok(())
    }

    /// Lay out a fresh file and insert every record of `scan`.
    fn build<S: RelationScan>(&mut self, metadata: &IndexMetadata, mut scan: S) -> Result<()> {
        MetadataStore::new(&self.bpm).bootstrap(metadata)?;

        let offset = metadata.attr_byte_offset as usize;
        let mut count = 0usize;
        while let Some(record) = scan.next_record() {
            let (rid, bytes) = record?;
            let key = read_key(&bytes, offset)?;
            self.insert_entry(key, rid)?;
            count += 1;
        }

        self.flush()?;
        info!("built index {} from {} records", self.path.display(), count);
        Ok(())
    }

    fn tree(&self) -> Tree<'_> {
        Tree::new(&self.bpm, self.leaf_capacity, self.internal_capacity)
    }

    /// The index file's name, `"{relation}.{offset}"`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add `(key, rid)`. Equal keys keep their insertion order.
    pub fn insert_entry(&mut self, key: i32, rid: RecordId) -> Result<()> {
        self.tree().insert(key, rid)
    }

    /// Begin a range scan, replacing any scan in progress.
    ///
    /// # Errors
    /// `Error::BadOpcodes` or `Error::BadScanRange` for invalid bounds; the
    /// previous scan, if any, is left as it was.
    pub fn start_scan(&mut self, low: i32, low_op: Operator, high: i32, high_op: Operator) -> Result<()> {
        let tree = Tree::new(&self.bpm, self.leaf_capacity, self.internal_capacity);
        self.cursor.start(&tree, low, low_op, high, high_op)
    }

    /// Record id of the next entry in range.
    ///
    /// # Errors
    /// `Error::IndexScanCompleted` when the range is exhausted, after which
    /// the scan is no longer executing. `Error::ScanNotInitialized` without an
    /// executing scan.
    pub fn scan_next(&mut self) -> Result<RecordId> {
        let tree = Tree::new(&self.bpm, self.leaf_capacity, self.internal_capacity);
        self.cursor.next(&tree)
    }

    pub fn end_scan(&mut self) -> Result<()> {
        self.cursor.end()
    }

    pub fn is_scanning(&self) -> bool {
        self.cursor.is_executing()
    }

    /// Every record id stored under `key`, in insertion order.
    ///
    /// Does not disturb an executing scan.
    pub fn lookup(&mut self, key: i32) -> Result<Vec<RecordId>> {
        self.tree().lookup(key)
    }

    /// Write every dirty page back and sync the file.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()
    }

    /// Verify the tree structure and report its shape.
    pub fn check_integrity(&self) -> Result<TreeStats> {
        self.tree().check_integrity()
    }

    /// Levels including the leaf level.
    pub fn height(&self) -> Result<usize> {
        self.tree().height()
    }

    pub fn metadata(&self) -> Result<IndexMetadata> {
        MetadataStore::new(&self.bpm).read()
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.bpm
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        let _ = self.cursor.end();
        if let Err(e) = self.flush() {
            warn!("failed to flush index {}: {}", self.path.display(), e);
        }
    }
}

/// The little-endian `i32` key at `offset` in `record`.
fn read_key(record: &[u8], offset: usize) -> Result<i32> {
    let bytes = offset
        .checked_add(4)
        .and_then(|end| record.get(offset..end))
        .ok_or(Error::RecordTooShort {
            len: record.len(),
            offset,
        })?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter;
    use tempfile::tempdir;

    fn config() -> IndexConfig {
        IndexConfig::default()
            .with_pool_size(8)
            .with_leaf_capacity(4)
            .with_internal_capacity(4)
            .with_sync_writes(false)
    }

    fn no_records() -> impl RelationScan {
        iter::empty::<Result<(RecordId, Vec<u8>)>>()
    }

    #[test]
    fn test_read_key() {
        let record = [0u8, 0, 0xFE, 0xFF, 0xFF, 0xFF];
        assert_eq!(read_key(&record, 2).unwrap(), -2);
        assert!(matches!(
            read_key(&record, 3),
            Err(Error::RecordTooShort { len: 6, offset: 3 })
        ));
        assert!(matches!(
            read_key(&record, usize::MAX),
            Err(Error::RecordTooShort { .. })
        ));
    }

    #[test]
    fn test_construct_rejects_bad_arguments() {
        let dir = tempdir().unwrap();

        let result = BTreeIndex::construct(dir.path(), "rel", 0, Datatype::Double, no_records(), config());
        assert!(matches!(
            result,
            Err(Error::UnsupportedAttributeType(Datatype::Double))
        ));

        let long = "x".repeat(MAX_RELATION_NAME_LEN + 1);
        let result = BTreeIndex::construct(dir.path(), &long, 0, Datatype::Integer, no_records(), config());
        assert!(matches!(result, Err(Error::RelationNameTooLong(65))));

        let result = BTreeIndex::construct(
            dir.path(),
            "rel",
            0,
            Datatype::Integer,
            no_records(),
            config().with_leaf_capacity(1),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_bulk_load_removes_file() {
        let dir = tempdir().unwrap();
        let records: Vec<Result<(RecordId, Vec<u8>)>> = vec![
            Ok((RecordId::new(PageId::new(0), 0), 7i32.to_le_bytes().to_vec())),
            Ok((RecordId::new(PageId::new(0), 1), vec![1, 2])),
        ];

        let result = BTreeIndex::construct(dir.path(), "rel", 0, Datatype::Integer, records.into_iter(), config());
        assert!(matches!(result, Err(Error::RecordTooShort { len: 2, offset: 0 })));
        assert!(!dir.path().join("rel.0").exists());
    }

    #[test]
    fn test_scan_state_survives_lookup() {
        let dir = tempdir().unwrap();
        let mut index =
            BTreeIndex::construct(dir.path(), "rel", 0, Datatype::Integer, no_records(), config()).unwrap();
        for k in 0..20 {
            index.insert_entry(k, RecordId::new(PageId::new(k as u32), 0)).unwrap();
        }

        index.start_scan(3, Operator::Gte, 6, Operator::Lt).unwrap();
        assert_eq!(index.scan_next().unwrap().page_id, PageId::new(3));
        assert_eq!(index.lookup(15).unwrap().len(), 1);
        assert_eq!(index.scan_next().unwrap().page_id, PageId::new(4));
        assert!(index.is_scanning());
        index.end_scan().unwrap();
        assert!(!index.is_scanning());
    }
}
