//! RAII pin guards.
//!
//! Fetching a page pins its frame and returns a guard; dropping the guard
//! releases the frame lock and then the pin. Page memory is only reachable
//! through a guard, so nothing borrowed from a page can outlive its pin.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;

/// One pin on one frame. Unpins when dropped, reporting whether the page
/// was modified.
struct Pin<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    dirty: bool,
}

impl Drop for Pin<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, self.dirty);
    }
}

/// Shared access to a pinned page. Unpins clean.
///
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let leaf = LeafNode::decode(&guard, page_id)?;
/// drop(guard);
/// ```
pub struct PageReadGuard<'a> {
    // Field order matters: the lock is released before the pin.
    lock: RwLockReadGuard<'a, Page>,
    pin: Pin<'a>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            lock,
            pin: Pin {
                bpm,
                frame_id,
                page_id,
                dirty: false,
            },
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Exclusive access to a pinned page.
///
/// Any mutable access marks the page dirty, so the unpin on drop schedules
/// it for write-back. A guard fresh from `new_page` starts out dirty.
pub struct PageWriteGuard<'a> {
    lock: RwLockWriteGuard<'a, Page>,
    pin: Pin<'a>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
        dirty: bool,
    ) -> Self {
        Self {
            lock,
            pin: Pin {
                bpm,
                frame_id,
                page_id,
                dirty,
            },
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.pin.dirty
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.pin.dirty = true;
        &mut self.lock
    }
}
