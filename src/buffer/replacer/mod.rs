//! Eviction policy implementations (replacers).
//!
//! - [`FifoReplacer`] - oldest unpinned frame first

mod fifo;

pub use fifo::FifoReplacer;
