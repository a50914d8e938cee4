//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between disk and memory. Pages live in [`Frame`](crate::buffer::Frame)s
//! within the buffer pool.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// `Page` does NOT implement `Clone` outside tests: copying 4KB should be
/// explicit.
///
/// # Example
/// ```
/// use keyspan::storage::page::{Page, PageType};
/// use keyspan::PageId;
///
/// let mut page = Page::new();
/// page.body_mut()[0] = 0xFF;
/// page.seal(PageType::BTreeLeaf, PageId::new(3));
/// assert!(page.validate(PageType::BTreeLeaf, PageId::new(3)).is_ok());
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes after the page header.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.data[PageHeader::SIZE..]
    }

    /// Mutable bytes after the page header.
    #[inline]
    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.data[PageHeader::SIZE..]
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }

    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the page are complete.
    pub fn update_checksum(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.data[PageHeader::OFFSET_CHECKSUM..PageHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }

    /// Stamp the header for `page_id` and checksum the finished body.
    pub fn seal(&mut self, page_type: PageType, page_id: PageId) {
        self.set_header(&PageHeader::new(page_type, page_id));
        self.update_checksum();
    }

    /// Check that this page was sealed as `expected` for `page_id` and has not
    /// been modified since.
    ///
    /// # Errors
    /// `Error::Corrupted` describing the first mismatch found.
    pub fn validate(&self, expected: PageType, page_id: PageId) -> Result<()> {
        let header = self.header();
        let reason = if header.page_type != expected {
            format!("expected {:?} page, found {:?}", expected, header.page_type)
        } else if header.page_id != page_id {
            format!("header belongs to {}", header.page_id)
        } else if !header.verify_checksum(&self.data) {
            "checksum mismatch".to_string()
        } else {
            return Ok(());
        };
        Err(Error::Corrupted { page_id, reason })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_and_alignment() {
        assert_eq!(std::mem::size_of::<Page>(), PAGE_SIZE);
        assert_eq!(std::mem::align_of::<Page>(), 4096);
    }

    #[test]
    fn test_body_starts_after_header() {
        let mut page = Page::new();
        page.body_mut()[0] = 0xAB;
        assert_eq!(page.as_slice()[PageHeader::SIZE], 0xAB);
        assert_eq!(page.body().len(), PAGE_SIZE - PageHeader::SIZE);
    }

    #[test]
    fn test_seal_and_validate() {
        let mut page = Page::new();
        page.body_mut()[10] = 7;
        page.seal(PageType::BTreeInternal, PageId::new(5));

        assert!(page.validate(PageType::BTreeInternal, PageId::new(5)).is_ok());
        assert!(matches!(
            page.validate(PageType::BTreeLeaf, PageId::new(5)),
            Err(Error::Corrupted { .. })
        ));
        assert!(matches!(
            page.validate(PageType::BTreeInternal, PageId::new(6)),
            Err(Error::Corrupted { .. })
        ));
    }

    #[test]
    fn test_validate_detects_modified_body() {
        let mut page = Page::new();
        page.seal(PageType::BTreeLeaf, PageId::new(1));

        let mut copy = page.clone();
        copy.body_mut()[100] = 1;
        assert!(copy.validate(PageType::BTreeLeaf, PageId::new(1)).is_err());
    }

    #[test]
    fn test_zeroed_page_is_invalid() {
        let page = Page::new();
        assert!(page.validate(PageType::BTreeLeaf, PageId::new(0)).is_err());
    }
}
