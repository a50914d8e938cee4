//! Configuration constants and per-index settings.

use crate::common::{Error, Result};
use crate::storage::page::PageHeader;

/// Size of a page in bytes (4KB).
///
/// Every node, the metadata record and the file header occupy exactly one
/// page each.
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId.
pub const MAX_PAGES: u64 = (u32::MAX as u64) + 1;

/// Width of an encoded key (`i32`).
pub const KEY_SIZE: usize = 4;

/// Width of an encoded child page id (`u32`).
pub const PAGE_ID_SIZE: usize = 4;

/// Width of an encoded record id (`u32` page + `u16` slot).
pub const RECORD_ID_SIZE: usize = 6;

/// Bytes used by an internal node before its key array: level + key count.
pub const INTERNAL_PREFIX_SIZE: usize = 1 + 2;

/// Bytes used by a leaf node before its key array: key count + right sibling.
pub const LEAF_PREFIX_SIZE: usize = 2 + PAGE_ID_SIZE;

/// Largest internal fan-out that fits one page.
///
/// An internal node stores `N` keys and `N + 1` children:
/// `header + prefix + N*KEY + (N+1)*PAGE_ID <= PAGE_SIZE`.
pub const MAX_INTERNAL_CAPACITY: usize =
    (PAGE_SIZE - PageHeader::SIZE - INTERNAL_PREFIX_SIZE - PAGE_ID_SIZE)
        / (KEY_SIZE + PAGE_ID_SIZE);

/// Largest leaf occupancy that fits one page.
pub const MAX_LEAF_CAPACITY: usize =
    (PAGE_SIZE - PageHeader::SIZE - LEAF_PREFIX_SIZE) / (KEY_SIZE + RECORD_ID_SIZE);

/// Smallest capacity that still lets a split leave both halves non-empty.
pub const MIN_CAPACITY: usize = 2;

/// Default number of frames in the index's buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Settings for building or opening an index.
///
/// The two capacities are persisted in the index metadata when the file is
/// created; reopening with different values fails with `BadIndexInfo`.
///
/// # Example
/// ```
/// use keyspan::IndexConfig;
///
/// let config = IndexConfig::default()
///     .with_pool_size(16)
///     .with_leaf_capacity(4)
///     .with_internal_capacity(4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Frames in the buffer pool backing the index file.
    pub pool_size: usize,
    /// Maximum keys per leaf (M).
    pub leaf_capacity: usize,
    /// Maximum keys per internal node (N).
    pub internal_capacity: usize,
    /// `fsync` after every page write-back.
    pub sync_writes: bool,
}

impl IndexConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_leaf_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = capacity;
        self
    }

    pub fn with_internal_capacity(mut self, capacity: usize) -> Self {
        self.internal_capacity = capacity;
        self
    }

    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Check the settings against the page layout limits.
    ///
    /// # Errors
    /// `Error::InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        // A split pins at most a handful of pages at once.
        if self.pool_size < 4 {
            return Err(Error::InvalidConfig(format!(
                "pool_size must be at least 4, got {}",
                self.pool_size
            )));
        }
        if !(MIN_CAPACITY..=MAX_LEAF_CAPACITY).contains(&self.leaf_capacity) {
            return Err(Error::InvalidConfig(format!(
                "leaf_capacity must be in {}..={}, got {}",
                MIN_CAPACITY, MAX_LEAF_CAPACITY, self.leaf_capacity
            )));
        }
        if !(MIN_CAPACITY..=MAX_INTERNAL_CAPACITY).contains(&self.internal_capacity) {
            return Err(Error::InvalidConfig(format!(
                "internal_capacity must be in {}..={}, got {}",
                MIN_CAPACITY, MAX_INTERNAL_CAPACITY, self.internal_capacity
            )));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            leaf_capacity: MAX_LEAF_CAPACITY,
            internal_capacity: MAX_INTERNAL_CAPACITY,
            sync_writes: true,
        }
    }
}
