//! End-to-end tests for `BTreeIndex`: construction, inserts, scans and
//! reopening an existing index file.

use keyspan::{BTreeIndex, Datatype, Error, IndexConfig, Operator, PageId, RecordId};
use tempfile::{tempdir, TempDir};

type Record = keyspan::Result<(RecordId, Vec<u8>)>;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_config() -> IndexConfig {
    IndexConfig::default()
        .with_pool_size(16)
        .with_leaf_capacity(4)
        .with_internal_capacity(3)
        .with_sync_writes(false)
}

fn rid(key: i32) -> RecordId {
    RecordId::new(PageId::new(key as u32), (key % 100) as u16)
}

/// Relation records of 12 bytes with the key at byte offset 4.
fn relation(keys: &[i32]) -> Vec<Record> {
    keys.iter()
        .enumerate()
        .map(|(slot, &key)| {
            let mut bytes = vec![0xAB; 12];
            bytes[4..8].copy_from_slice(&key.to_le_bytes());
            Ok((RecordId::new(PageId::new(9), slot as u16), bytes))
        })
        .collect()
}

fn empty_index(dir: &TempDir) -> BTreeIndex {
    init_logging();
    BTreeIndex::construct(
        dir.path(),
        "relA",
        4,
        Datatype::Integer,
        Vec::<Record>::new().into_iter(),
        small_config(),
    )
    .unwrap()
}

fn drain(index: &mut BTreeIndex) -> Vec<RecordId> {
    let mut out = Vec::new();
    loop {
        match index.scan_next() {
            Ok(rid) => out.push(rid),
            Err(Error::IndexScanCompleted) => return out,
            Err(e) => panic!("scan failed: {e}"),
        }
    }
}

#[test]
fn test_scan_example() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    for k in [3, 5, 7, 9, 11] {
        index.insert_entry(k, rid(k)).unwrap();
    }

    index.start_scan(5, Operator::Gte, 10, Operator::Lte).unwrap();
    assert_eq!(index.scan_next().unwrap(), rid(5));
    assert_eq!(index.scan_next().unwrap(), rid(7));
    assert_eq!(index.scan_next().unwrap(), rid(9));
    assert!(matches!(index.scan_next(), Err(Error::IndexScanCompleted)));
    assert!(!index.is_scanning());
}

#[test]
fn test_bad_scan_range_before_traversal() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    let misses = index.buffer_pool().stats().snapshot();

    assert!(matches!(
        index.start_scan(10, Operator::Gt, 5, Operator::Lt),
        Err(Error::BadScanRange { low: 10, high: 5 })
    ));
    assert!(matches!(
        index.start_scan(1, Operator::Lte, 5, Operator::Lt),
        Err(Error::BadOpcodes)
    ));

    let after = index.buffer_pool().stats().snapshot();
    assert_eq!(after.cache_hits, misses.cache_hits);
    assert_eq!(after.cache_misses, misses.cache_misses);
    assert!(!index.is_scanning());
}

#[test]
fn test_scan_without_start() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    index.insert_entry(1, rid(1)).unwrap();

    assert!(matches!(index.scan_next(), Err(Error::ScanNotInitialized)));
    assert!(matches!(index.end_scan(), Err(Error::ScanNotInitialized)));
    assert_eq!(index.buffer_pool().pinned_page_count(), 0);
}

#[test]
fn test_end_scan_releases_everything() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    for k in 0..50 {
        index.insert_entry(k, rid(k)).unwrap();
    }

    index.start_scan(10, Operator::Gt, 40, Operator::Lt).unwrap();
    assert_eq!(index.scan_next().unwrap(), rid(11));
    index.end_scan().unwrap();

    assert_eq!(index.buffer_pool().pinned_page_count(), 0);
    assert!(matches!(index.scan_next(), Err(Error::ScanNotInitialized)));
}

#[test]
fn test_restart_replaces_scan() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    for k in 0..30 {
        index.insert_entry(k, rid(k)).unwrap();
    }

    index.start_scan(0, Operator::Gte, 29, Operator::Lte).unwrap();
    index.scan_next().unwrap();
    index.start_scan(20, Operator::Gte, 22, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index), vec![rid(20), rid(21), rid(22)]);
}

#[test]
fn test_duplicates_append_after_equal_keys() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    for k in [8, 2, 6] {
        index.insert_entry(k, rid(k)).unwrap();
    }
    let dups: Vec<RecordId> = (0..10).map(|slot| RecordId::new(PageId::new(500), slot)).collect();
    for (i, &dup) in dups.iter().enumerate() {
        index.insert_entry(6, dup).unwrap();
        if i == 4 {
            index.insert_entry(7, rid(7)).unwrap();
        }
    }

    let mut expected = vec![rid(6)];
    expected.extend_from_slice(&dups);
    assert_eq!(index.lookup(6).unwrap(), expected);

    index.start_scan(6, Operator::Gte, 6, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index), expected);
    index.check_integrity().unwrap();
}

#[test]
fn test_leaf_split_keeps_capacity_and_links() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    for k in 1..=5 {
        index.insert_entry(k * 10, rid(k * 10)).unwrap();
    }

    let stats = index.check_integrity().unwrap();
    assert_eq!(stats.height, 2);
    assert_eq!(stats.leaf_count, 2);
    assert_eq!(stats.entry_count, 5);

    index.start_scan(i32::MIN, Operator::Gte, i32::MAX, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index), (1..=5).map(|k| rid(k * 10)).collect::<Vec<_>>());
}

#[test]
fn test_root_split_increases_height_by_one() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);

    let mut inserted = Vec::new();
    let mut k = 0;
    let mut height = index.height().unwrap();
    while height < 4 {
        index.insert_entry(k, rid(k)).unwrap();
        inserted.push(k);
        k += 1;

        let now = index.height().unwrap();
        assert!(now == height || now == height + 1);
        height = now;
    }

    let stats = index.check_integrity().unwrap();
    assert_eq!(stats.height, 4);
    assert_eq!(stats.entry_count, inserted.len());
    for &key in &inserted {
        assert_eq!(index.lookup(key).unwrap(), vec![rid(key)]);
    }
}

#[test]
fn test_negative_and_extreme_keys() {
    let dir = tempdir().unwrap();
    let mut index = empty_index(&dir);
    let keys = [0, -1, i32::MIN, i32::MAX, -500, 500, -2, 2, -1];
    for (slot, &k) in keys.iter().enumerate() {
        index.insert_entry(k, RecordId::new(PageId::new(3), slot as u16)).unwrap();
    }

    index.start_scan(i32::MIN, Operator::Gte, 0, Operator::Lt).unwrap();
    let slots: Vec<u16> = drain(&mut index).iter().map(|r| r.slot).collect();
    // i32::MIN, -500, -2, -1, -1
    assert_eq!(slots, vec![2, 4, 6, 1, 8]);

    index.start_scan(500, Operator::Gt, i32::MAX, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index), vec![RecordId::new(PageId::new(3), 3)]);
}

#[test]
fn test_bulk_load_and_reopen() {
    init_logging();
    let dir = tempdir().unwrap();
    let keys: Vec<i32> = (0..200).map(|i| (i * 37) % 101 - 50).collect();

    {
        let index = BTreeIndex::construct(
            dir.path(),
            "relA",
            4,
            Datatype::Integer,
            relation(&keys).into_iter(),
            small_config(),
        )
        .unwrap();
        assert_eq!(index.file_name(), "relA.4");
        assert_eq!(index.check_integrity().unwrap().entry_count, keys.len());
    }
    assert!(dir.path().join("relA.4").exists());

    // The scan is ignored when the file already exists.
    let mut index = BTreeIndex::construct(
        dir.path(),
        "relA",
        4,
        Datatype::Integer,
        relation(&[1, 2, 3]).into_iter(),
        small_config(),
    )
    .unwrap();
    assert_eq!(index.check_integrity().unwrap().entry_count, keys.len());

    let expected: Vec<RecordId> = keys
        .iter()
        .enumerate()
        .filter(|(_, &k)| k == 7)
        .map(|(slot, _)| RecordId::new(PageId::new(9), slot as u16))
        .collect();
    assert!(!expected.is_empty());
    assert_eq!(index.lookup(7).unwrap(), expected);

    let meta = index.metadata().unwrap();
    assert_eq!(meta.relation_name, "relA");
    assert_eq!(meta.attr_byte_offset, 4);
    assert_eq!(meta.leaf_capacity, 4);
}

#[test]
fn test_reopen_rejects_mismatch() {
    let dir = tempdir().unwrap();
    drop(empty_index(&dir));

    // Same file name, different relation.
    std::fs::rename(dir.path().join("relA.4"), dir.path().join("relB.4")).unwrap();
    let result = BTreeIndex::construct(
        dir.path(),
        "relB",
        4,
        Datatype::Integer,
        Vec::<Record>::new().into_iter(),
        small_config(),
    );
    assert!(matches!(result, Err(Error::BadIndexInfo(_))));
    std::fs::rename(dir.path().join("relB.4"), dir.path().join("relA.4")).unwrap();

    let result = BTreeIndex::construct(
        dir.path(),
        "relA",
        4,
        Datatype::Integer,
        Vec::<Record>::new().into_iter(),
        small_config().with_leaf_capacity(8),
    );
    assert!(matches!(result, Err(Error::BadIndexInfo(_))));

    // The settings it was built with still open it.
    assert!(BTreeIndex::construct(
        dir.path(),
        "relA",
        4,
        Datatype::Integer,
        Vec::<Record>::new().into_iter(),
        small_config(),
    )
    .is_ok());
}

#[test]
fn test_record_too_short_fails_construction() {
    let dir = tempdir().unwrap();
    let mut records = relation(&[1, 2]);
    records.push(Ok((RecordId::new(PageId::new(9), 2), vec![0; 6])));

    let result = BTreeIndex::construct(
        dir.path(),
        "relA",
        4,
        Datatype::Integer,
        records.into_iter(),
        small_config(),
    );
    assert!(matches!(result, Err(Error::RecordTooShort { len: 6, offset: 4 })));
    assert!(!dir.path().join("relA.4").exists());
}

#[test]
fn test_index_survives_tiny_buffer_pool() {
    let dir = tempdir().unwrap();
    let config = small_config().with_pool_size(4);
    let mut index = BTreeIndex::construct(
        dir.path(),
        "relA",
        0,
        Datatype::Integer,
        Vec::<Record>::new().into_iter(),
        config,
    )
    .unwrap();

    for k in (0..300).rev() {
        index.insert_entry(k, rid(k)).unwrap();
    }
    assert_eq!(index.buffer_pool().pinned_page_count(), 0);
    assert!(index.buffer_pool().stats().snapshot().evictions > 0);

    let stats = index.check_integrity().unwrap();
    assert_eq!(stats.entry_count, 300);
    index.start_scan(100, Operator::Gte, 104, Operator::Lte).unwrap();
    assert_eq!(drain(&mut index).len(), 5);
}
