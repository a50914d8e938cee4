//! Record location type.

use std::fmt;

use crate::common::config::RECORD_ID_SIZE;
use crate::common::PageId;

/// Location of a record in the indexed relation: page plus slot.
///
/// This is the value stored next to every key in a leaf.
///
/// # Layout (6 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     page_id (little-endian)
/// 4       2     slot    (little-endian)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    #[inline]
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }

    /// Write the 6-byte encoding into `buf`.
    ///
    /// # Panics
    /// Panics if `buf.len() < RECORD_ID_SIZE`.
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..RECORD_ID_SIZE].copy_from_slice(&self.slot.to_le_bytes());
    }

    /// Read the 6-byte encoding from `buf`.
    ///
    /// # Panics
    /// Panics if `buf.len() < RECORD_ID_SIZE`.
    pub fn read_from(buf: &[u8]) -> Self {
        let page_id = PageId::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let slot = u16::from_le_bytes([buf[4], buf[5]]);
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page_id.0, self.slot)
    }
}
