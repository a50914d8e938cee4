//! Index structures.
//!
//! - [`btree`] - Disk-backed B+Tree secondary index over integer keys

pub mod btree;
