//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashSet, VecDeque};

use crate::common::FrameId;

/// Evicts frames in the order they were first loaded, skipping pinned ones.
#[derive(Default)]
pub struct FifoReplacer {
    /// Front = oldest.
    queue: VecDeque<FrameId>,
    in_queue: HashSet<FrameId>,
    /// Frames with pin_count == 0.
    evictable: HashSet<FrameId>,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a frame was accessed. Re-access does not reorder.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if self.in_queue.insert(frame_id) {
            self.queue.push_back(frame_id);
        }
    }

    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Oldest evictable frame, or None if every tracked frame is pinned.
    ///
    /// Pinned frames examined on the way stay queued in their original order.
    pub fn evict(&mut self) -> Option<FrameId> {
        let pos = self
            .queue
            .iter()
            .position(|fid| self.evictable.contains(fid))?;
        let frame_id = self.queue.remove(pos)?;
        self.in_queue.remove(&frame_id);
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}
