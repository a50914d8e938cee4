//! keyspan - a disk-backed B+Tree secondary index over a paged buffer pool.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            keyspan                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/btree/)                  │   │
//! │  │   BTreeIndex: construct / insert / scan / lookup         │   │
//! │  │   Traversal → Insertion (split, promote) → Scan Cursor   │   │
//! │  │   Node Codec + Metadata Store (root pointer)             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferPoolManager + Frame + FIFO replacer + stats      │   │
//! │  │   PageReadGuard / PageWriteGuard (pin on fetch,          │   │
//! │  │   unpin on drop)                                         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │   DiskManager + Page + PageHeader (type, CRC32, id)      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, RecordId, Error, config)
//! - [`buffer`] - Buffer pool management
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - The B+Tree index
//!
//! # Quick Start
//! ```no_run
//! use keyspan::{BTreeIndex, Datatype, IndexConfig, Operator, PageId, RecordId};
//!
//! let records = (0..100u16).map(|slot| {
//!     let key = i32::from(slot) * 2;
//!     Ok::<_, keyspan::Error>((RecordId::new(PageId::new(0), slot), key.to_le_bytes().to_vec()))
//! });
//!
//! let mut index = BTreeIndex::construct(
//!     "/tmp", "orders", 0, Datatype::Integer, records, IndexConfig::default(),
//! )
//! .unwrap();
//! assert_eq!(index.file_name(), "orders.0");
//!
//! index.start_scan(10, Operator::Gte, 20, Operator::Lt).unwrap();
//! while let Ok(rid) = index.scan_next() {
//!     println!("{}", rid);
//! }
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{IndexConfig, PAGE_SIZE};
pub use common::{Error, FrameId, PageId, RecordId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, StatsSnapshot};
pub use index::btree::{index_file_name, BTreeIndex, Datatype, Operator, RelationScan, TreeStats};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
