//! Page header and type definitions.
//!
//! Every page of an index file starts with a [`PageHeader`]:
//! - [`PageType`] discriminator
//! - CRC32 checksum for integrity
//! - the page's own id, to catch pages written to the wrong offset

use crate::common::PageId;

/// Type of page stored on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Zeroed, never-written or corrupted page.
    #[default]
    Invalid = 0,
    /// Page 0: magic and format version.
    FileHeader = 1,
    /// Page 1: index identity and root pointer.
    IndexMeta = 2,
    /// B+Tree internal (non-leaf) node.
    BTreeInternal = 3,
    /// B+Tree leaf node.
    BTreeLeaf = 4,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::FileHeader,
            2 => PageType::IndexMeta,
            3 => PageType::BTreeInternal,
            4 => PageType::BTreeLeaf,
            _ => PageType::Invalid,
        }
    }
}

/// Metadata stored at the beginning of every page.
///
/// # Layout (9 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (PageType as u8)
/// 1       4     checksum (CRC32, little-endian)
/// 5       4     page_id (little-endian)
/// ```
///
/// The checksum covers the entire page with the checksum field itself read
/// as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub checksum: u32,
    pub page_id: PageId,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 9;

    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_PAGE_ID: usize = 5;

    /// Create a header for `page_id` with a zero checksum.
    pub fn new(page_type: PageType, page_id: PageId) -> Self {
        Self {
            page_type,
            checksum: 0,
            page_id,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]);
        let mut page_id = [0u8; 4];
        page_id.copy_from_slice(&data[Self::OFFSET_PAGE_ID..Self::OFFSET_PAGE_ID + 4]);

        Self {
            page_type: PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]),
            checksum: u32::from_le_bytes(checksum),
            page_id: PageId::from_le_bytes(page_id),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_PAGE_ID..Self::OFFSET_PAGE_ID + 4]
            .copy_from_slice(&self.page_id.to_le_bytes());
    }

    /// Compute the CRC32 of a page, treating the checksum field as zero.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Whether the stored checksum matches the page contents.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}
