//! One slot of the buffer pool.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// A cached page plus the bookkeeping the pin protocol needs.
///
/// A frame is either vacant or holds exactly one resident page. Everything
/// is behind interior mutability so frames can be shared by reference from
/// the pool's fixed `Vec`.
pub struct Frame {
    page: RwLock<Page>,
    resident: Mutex<Option<PageId>>,
    pins: AtomicU32,
    dirty: AtomicBool,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            resident: Mutex::new(None),
            pins: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// The page held by this frame, if any.
    #[inline]
    pub fn resident(&self) -> Option<PageId> {
        *self.resident.lock()
    }

    /// Make `page_id` resident with a single pin and a clean flag.
    pub fn install(&self, page_id: PageId) {
        *self.resident.lock() = Some(page_id);
        self.dirty.store(false, Ordering::Release);
        self.pins.store(1, Ordering::Release);
    }

    /// Forget the resident page. The caller has already written it back.
    pub fn vacate(&self) -> Option<PageId> {
        self.dirty.store(false, Ordering::Release);
        self.resident.lock().take()
    }

    /// Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pins.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the new pin count.
    ///
    /// # Panics
    /// Panics if the frame is not pinned.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let before = self.pins.fetch_sub(1, Ordering::AcqRel);
        assert!(before > 0, "unpin of an unpinned frame");
        before - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the dirty flag and report whether it was set.
    #[inline]
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_pins_once() {
        let frame = Frame::new();
        assert_eq!(frame.resident(), None);

        frame.mark_dirty();
        frame.install(PageId::new(4));
        assert_eq!(frame.resident(), Some(PageId::new(4)));
        assert_eq!(frame.pin_count(), 1);
        assert!(!frame.is_dirty());

        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.unpin(), 1);
        assert_eq!(frame.unpin(), 0);
        assert!(!frame.is_pinned());
    }

    #[test]
    #[should_panic(expected = "unpin of an unpinned frame")]
    fn test_unpin_underflow() {
        Frame::new().unpin();
    }

    #[test]
    fn test_take_dirty() {
        let frame = Frame::new();
        assert!(!frame.take_dirty());
        frame.mark_dirty();
        assert!(frame.take_dirty());
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_vacate() {
        let frame = Frame::new();
        frame.install(PageId::new(9));
        frame.unpin();
        frame.mark_dirty();

        assert_eq!(frame.vacate(), Some(PageId::new(9)));
        assert_eq!(frame.resident(), None);
        assert!(!frame.is_dirty());
    }
}
