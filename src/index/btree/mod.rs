//! Disk-backed B+Tree secondary index.
//!
//! Maps integer attribute values of a relation to [`RecordId`]s. Every node
//! lives in its own page and is read and written through the buffer pool;
//! nothing about the tree is cached in memory between operations.
//!
//! # Components
//! - [`node`] - Internal/leaf node structs and their page encodings
//! - [`meta`] - File header, index identity and the root pointer
//! - [`traversal`] - Root-to-leaf descent with lazy leaf creation
//! - `insert` - Insertion with leaf/internal splits and root growth
//! - [`scan`] - Range scan cursor and point lookups
//! - `check` - Structural integrity walk
//! - [`BTreeIndex`] - The public index handle
//!
//! [`RecordId`]: crate::common::RecordId

mod check;
mod index;
mod insert;
pub mod meta;
pub mod node;
pub mod scan;
pub mod traversal;

pub use check::TreeStats;
pub use index::{index_file_name, BTreeIndex, RelationScan};
pub use meta::{Datatype, IndexMetadata, MetadataStore};
pub use scan::{Operator, ScanCursor};
pub use traversal::{Descent, LeafPosition, PathStep, Tree};
