//! Metadata store: index identity and the root pointer.
//!
//! The first three pages of an index file are fixed:
//!
//! | page | contents                                   |
//! |------|--------------------------------------------|
//! | 0    | file header: magic + format version        |
//! | 1    | [`IndexMetadata`]: identity + root page id |
//! | 2    | initial root node                          |
//!
//! The root page id is read at the start of every root-relative operation
//! and rewritten only when the root changes.

use log::{debug, info};

use crate::buffer::BufferPoolManager;
use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::index::btree::node::InternalNode;
use crate::storage::page::{Page, PageType};

pub const FILE_HEADER_PAGE_ID: PageId = PageId(0);
pub const HEADER_PAGE_ID: PageId = PageId(1);
pub const INITIAL_ROOT_PAGE_ID: PageId = PageId(2);

/// Longest relation name the metadata record can hold, in bytes.
pub const MAX_RELATION_NAME_LEN: usize = 64;

const MAGIC: &[u8; 8] = b"KEYSPAN\0";
const FORMAT_VERSION: u16 = 1;

/// Type tag of the indexed attribute.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    Integer = 0,
    Double = 1,
    String = 2,
}

impl Datatype {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Datatype::Integer),
            1 => Some(Datatype::Double),
            2 => Some(Datatype::String),
            _ => None,
        }
    }
}

/// The persistent identity of an index plus its current root.
///
/// # Layout (after the page header)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     relation name length
/// 1       64    relation name (UTF-8, zero padded)
/// 65      4     attribute byte offset
/// 69      1     attribute type
/// 70      4     root page id
/// 74      2     leaf capacity
/// 76      2     internal capacity
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    pub relation_name: String,
    pub attr_byte_offset: u32,
    pub attr_type: Datatype,
    pub root_page_id: PageId,
    pub leaf_capacity: u16,
    pub internal_capacity: u16,
}

impl IndexMetadata {
    const OFFSET_NAME: usize = 1;
    const OFFSET_ATTR_OFFSET: usize = Self::OFFSET_NAME + MAX_RELATION_NAME_LEN;
    const OFFSET_ATTR_TYPE: usize = Self::OFFSET_ATTR_OFFSET + 4;
    const OFFSET_ROOT: usize = Self::OFFSET_ATTR_TYPE + 1;
    const OFFSET_LEAF_CAP: usize = Self::OFFSET_ROOT + 4;
    const OFFSET_INTERNAL_CAP: usize = Self::OFFSET_LEAF_CAP + 2;

    /// Whether this index was built for `relation_name`'s attribute at
    /// `attr_byte_offset` of type `attr_type`.
    pub fn matches(&self, relation_name: &str, attr_byte_offset: u32, attr_type: Datatype) -> bool {
        self.relation_name == relation_name
            && self.attr_byte_offset == attr_byte_offset
            && self.attr_type == attr_type
    }

    /// # Panics
    /// Panics if the relation name is longer than `MAX_RELATION_NAME_LEN`;
    /// construction rejects such names before any metadata is built.
    pub fn encode(&self, page: &mut Page, page_id: PageId) {
        let name = self.relation_name.as_bytes();
        assert!(name.len() <= MAX_RELATION_NAME_LEN, "relation name too long");

        page.reset();
        let body = page.body_mut();
        body[0] = name.len() as u8;
        body[Self::OFFSET_NAME..Self::OFFSET_NAME + name.len()].copy_from_slice(name);
        body[Self::OFFSET_ATTR_OFFSET..Self::OFFSET_ATTR_OFFSET + 4]
            .copy_from_slice(&self.attr_byte_offset.to_le_bytes());
        body[Self::OFFSET_ATTR_TYPE] = self.attr_type as u8;
        body[Self::OFFSET_ROOT..Self::OFFSET_ROOT + 4]
            .copy_from_slice(&self.root_page_id.to_le_bytes());
        body[Self::OFFSET_LEAF_CAP..Self::OFFSET_LEAF_CAP + 2]
            .copy_from_slice(&self.leaf_capacity.to_le_bytes());
        body[Self::OFFSET_INTERNAL_CAP..Self::OFFSET_INTERNAL_CAP + 2]
            .copy_from_slice(&self.internal_capacity.to_le_bytes());

        page.seal(PageType::IndexMeta, page_id);
    }

    pub fn decode(page: &Page, page_id: PageId) -> Result<Self> {
        page.validate(PageType::IndexMeta, page_id)?;
        let body = page.body();

        let name_len = body[0] as usize;
        if name_len > MAX_RELATION_NAME_LEN {
            return Err(corrupted(page_id, "relation name length out of range"));
        }
        let relation_name =
            std::str::from_utf8(&body[Self::OFFSET_NAME..Self::OFFSET_NAME + name_len])
                .map_err(|_| corrupted(page_id, "relation name is not UTF-8"))?
                .to_string();

        let attr_type = Datatype::from_u8(body[Self::OFFSET_ATTR_TYPE])
            .ok_or_else(|| corrupted(page_id, "unknown attribute type"))?;

        let u32_at = |off: usize| u32::from_le_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]]);
        let u16_at = |off: usize| u16::from_le_bytes([body[off], body[off + 1]]);

        Ok(Self {
            relation_name,
            attr_byte_offset: u32_at(Self::OFFSET_ATTR_OFFSET),
            attr_type,
            root_page_id: PageId::new(u32_at(Self::OFFSET_ROOT)),
            leaf_capacity: u16_at(Self::OFFSET_LEAF_CAP),
            internal_capacity: u16_at(Self::OFFSET_INTERNAL_CAP),
        })
    }
}

/// Reads and updates the metadata page through the buffer pool.
///
/// Holds no pins: every call pins the header page, decodes, and unpins.
pub struct MetadataStore<'a> {
    bpm: &'a BufferPoolManager,
}

impl<'a> MetadataStore<'a> {
    pub fn new(bpm: &'a BufferPoolManager) -> Self {
        Self { bpm }
    }

    /// Lay out pages 0-2 of a brand-new, empty index file.
    ///
    /// The root recorded in `metadata` is replaced by page 2, which is
    /// written as an empty internal node above a single unallocated leaf.
    pub fn bootstrap(&self, metadata: &IndexMetadata) -> Result<()> {
        {
            let mut guard = self.bpm.new_page()?;
            expect_page(guard.page_id(), FILE_HEADER_PAGE_ID)?;
            write_file_header(&mut guard, FILE_HEADER_PAGE_ID);
        }
        {
            let mut guard = self.bpm.new_page()?;
            expect_page(guard.page_id(), HEADER_PAGE_ID)?;
            let metadata = IndexMetadata {
                root_page_id: INITIAL_ROOT_PAGE_ID,
                ..metadata.clone()
            };
            metadata.encode(&mut guard, HEADER_PAGE_ID);
        }
        {
            let mut guard = self.bpm.new_page()?;
            expect_page(guard.page_id(), INITIAL_ROOT_PAGE_ID)?;
            InternalNode::empty_root().encode(&mut guard, INITIAL_ROOT_PAGE_ID);
        }

        info!(
            "bootstrapped index on {}@{} (root {})",
            metadata.relation_name, metadata.attr_byte_offset, INITIAL_ROOT_PAGE_ID
        );
        Ok(())
    }

    /// Check the magic and format version on page 0.
    pub fn check_file_header(&self) -> Result<()> {
        let guard = self.bpm.fetch_page_read(FILE_HEADER_PAGE_ID)?;
        read_file_header(&guard, FILE_HEADER_PAGE_ID)
    }

    pub fn read(&self) -> Result<IndexMetadata> {
        let guard = self.bpm.fetch_page_read(HEADER_PAGE_ID)?;
        IndexMetadata::decode(&guard, HEADER_PAGE_ID)
    }

    pub fn get_root(&self) -> Result<PageId> {
        Ok(self.read()?.root_page_id)
    }

    /// Point the index at a new root page.
    pub fn set_root(&self, root: PageId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(HEADER_PAGE_ID)?;
        let mut metadata = IndexMetadata::decode(&guard, HEADER_PAGE_ID)?;
        metadata.root_page_id = root;
        metadata.encode(&mut guard, HEADER_PAGE_ID);

        debug!("root moved to {}", root);
        Ok(())
    }

    /// True iff the stored identity matches the caller's.
    pub fn verify(&self, relation_name: &str, attr_byte_offset: u32, attr_type: Datatype) -> Result<bool> {
        Ok(self.read()?.matches(relation_name, attr_byte_offset, attr_type))
    }
}

fn write_file_header(page: &mut Page, page_id: PageId) {
    page.reset();
    let body = page.body_mut();
    body[0..8].copy_from_slice(MAGIC);
    body[8..10].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    body[10..14].copy_from_slice(&(PAGE_SIZE as u32).to_le_bytes());
    page.seal(PageType::FileHeader, page_id);
}

fn read_file_header(page: &Page, page_id: PageId) -> Result<()> {
    page.validate(PageType::FileHeader, page_id)?;
    let body = page.body();

    if &body[0..8] != MAGIC {
        return Err(corrupted(page_id, "not a keyspan index file"));
    }
    let version = u16::from_le_bytes([body[8], body[9]]);
    if version != FORMAT_VERSION {
        return Err(Error::Corrupted {
            page_id,
            reason: format!("unsupported format version {}", version),
        });
    }
    let page_size = u32::from_le_bytes([body[10], body[11], body[12], body[13]]);
    if page_size as usize != PAGE_SIZE {
        return Err(Error::Corrupted {
            page_id,
            reason: format!("file uses {} byte pages", page_size),
        });
    }
    Ok(())
}

fn expect_page(actual: PageId, expected: PageId) -> Result<()> {
    if actual != expected {
        return Err(Error::Corrupted {
            page_id: actual,
            reason: format!("bootstrap expected a fresh file, allocated {}", actual),
        });
    }
    Ok(())
}

fn corrupted(page_id: PageId, reason: &str) -> Error {
    Error::Corrupted {
        page_id,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    fn sample() -> IndexMetadata {
        IndexMetadata {
            relation_name: "relA".to_string(),
            attr_byte_offset: 8,
            attr_type: Datatype::Integer,
            root_page_id: PageId::new(17),
            leaf_capacity: 4,
            internal_capacity: 3,
        }
    }

    fn create_bpm() -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("relA.8"))
            .unwrap()
            .with_sync_writes(false);
        (BufferPoolManager::new(8, dm), dir)
    }

    #[test]
    fn test_metadata_roundtrip() {
        let mut page = Page::new();
        let meta = IndexMetadata {
            relation_name: "r".repeat(MAX_RELATION_NAME_LEN),
            ..sample()
        };
        meta.encode(&mut page, HEADER_PAGE_ID);
        assert_eq!(IndexMetadata::decode(&page, HEADER_PAGE_ID).unwrap(), meta);
    }

    #[test]
    fn test_matches() {
        let meta = sample();
        assert!(meta.matches("relA", 8, Datatype::Integer));
        assert!(!meta.matches("relB", 8, Datatype::Integer));
        assert!(!meta.matches("relA", 4, Datatype::Integer));
        assert!(!meta.matches("relA", 8, Datatype::Double));
    }

    #[test]
    fn test_bootstrap_lays_out_fixed_pages() {
        let (bpm, _dir) = create_bpm();
        let store = MetadataStore::new(&bpm);
        store.bootstrap(&sample()).unwrap();

        store.check_file_header().unwrap();
        assert_eq!(store.get_root().unwrap(), INITIAL_ROOT_PAGE_ID);
        assert!(store.verify("relA", 8, Datatype::Integer).unwrap());
        assert!(!store.verify("relA", 12, Datatype::Integer).unwrap());

        let guard = bpm.fetch_page_read(INITIAL_ROOT_PAGE_ID).unwrap();
        let root = InternalNode::decode(&guard, INITIAL_ROOT_PAGE_ID).unwrap();
        assert_eq!(root, InternalNode::empty_root());
    }

    #[test]
    fn test_set_root_persists_and_unpins() {
        let (bpm, _dir) = create_bpm();
        let store = MetadataStore::new(&bpm);
        store.bootstrap(&sample()).unwrap();

        store.set_root(PageId::new(40)).unwrap();
        assert_eq!(store.get_root().unwrap(), PageId::new(40));
        assert_eq!(store.read().unwrap().relation_name, "relA");
        assert_eq!(bpm.pinned_page_count(), 0);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let (bpm, _dir) = create_bpm();
        let store = MetadataStore::new(&bpm);
        store.bootstrap(&sample()).unwrap();

        {
            let mut guard = bpm.fetch_page_write(FILE_HEADER_PAGE_ID).unwrap();
            guard.body_mut()[0] = b'X';
            guard.update_checksum();
        }
        assert!(matches!(
            store.check_file_header(),
            Err(Error::Corrupted { .. })
        ));
    }
}
