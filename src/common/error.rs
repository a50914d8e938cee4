//! Error types for keyspan.

use std::path::PathBuf;

use thiserror::Error;

use crate::common::PageId;
use crate::index::btree::Datatype;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in keyspan.
///
/// Buffer pool, storage and index failures share this one enum so that `?`
/// works across every layer.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The index file does not exist yet.
    ///
    /// Construction handles this by bootstrapping and bulk-loading a new file.
    #[error("Index file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// An existing index file was built for a different relation, attribute
    /// or node capacity.
    #[error("Index file does not match the requested index: {0}")]
    BadIndexInfo(String),

    /// Scan bounds use operators other than `>`/`>=` (low) and `<`/`<=` (high).
    #[error("Unsupported scan operators")]
    BadOpcodes,

    /// Low scan bound is greater than the high bound.
    #[error("Invalid scan range: low {low} > high {high}")]
    BadScanRange { low: i32, high: i32 },

    /// `scan_next` or `end_scan` called without an executing scan.
    #[error("No scan has been started")]
    ScanNotInitialized,

    /// End-of-sequence signal: the scan has no further matching entries.
    #[error("Index scan completed")]
    IndexScanCompleted,

    /// A node references a child page that does not exist.
    #[error("Invalid page reference: {0}")]
    InvalidPage(PageId),

    /// A page failed validation (checksum, page type, magic or layout).
    #[error("{page_id} is corrupted: {reason}")]
    Corrupted { page_id: PageId, reason: String },

    /// Only integer keys are supported.
    #[error("Unsupported attribute type: {0:?}")]
    UnsupportedAttributeType(Datatype),

    /// A relation record is too short to contain the key attribute.
    #[error("Record of {len} bytes has no key at byte offset {offset}")]
    RecordTooShort { len: usize, offset: usize },

    /// Relation names are stored in a fixed-width metadata field.
    #[error("Relation name is {0} bytes, the limit is 64")]
    RelationNameTooLong(usize),

    /// `IndexConfig` failed validation.
    #[error("Invalid index configuration: {0}")]
    InvalidConfig(String),
}
