//! Buffer Pool Manager - the page cache the index reads and writes through.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between the index file and memory
//! - Pin-based reference counting through RAII guards
//! - Dirty page write-back on eviction and flush
//! - FIFO eviction of unpinned frames

use std::collections::HashMap;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::frame::Frame;
use crate::buffer::{BufferPoolStats, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Manages a pool of buffer frames caching pages of one index file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ FifoReplacer │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Pin protocol
/// The pool's operations map onto the classic page-file interface:
///
/// | operation  | here                                             |
/// |------------|--------------------------------------------------|
/// | allocPage  | [`new_page`](Self::new_page) (pinned write guard) |
/// | readPage   | [`fetch_page_read`](Self::fetch_page_read) / [`fetch_page_write`](Self::fetch_page_write) |
/// | unpinPage  | dropping the guard (write guards mark dirty)      |
/// | writePage  | [`flush_page`](Self::flush_page)                  |
/// | flushFile  | [`flush_all_pages`](Self::flush_all_pages)        |
///
/// # Thread Safety
/// - `page_table`: `RwLock`
/// - `free_list`, `replacer`, `disk_manager`: `Mutex`
/// - `frames`: fixed size, each Frame has internal locks
/// - `stats`: relaxed atomic counters
/// - `stats`: atomic counters
pub struct BufferPoolManager {
    frames: Vec<Frame>,

    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,

    replacer: Mutex<FifoReplacer>,

    disk_manager: Mutex<DiskManager>,

    stats: BufferPoolStats,

    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager over `disk_manager`.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(FifoReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Fetch pages
    // ========================================================================

    /// Pin a page for reading. The guard unpins it clean when dropped.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Pin a page for writing. The guard unpins it dirty once written through.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock, false))
    }

    /// Allocate a new zeroed page on disk and pin it for writing.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from disk allocation
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let page_id = match self.disk_manager.lock().allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.install(page_id);
        self.stats.record_allocation();

        self.page_table.write().insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock, true))
    }

    // ========================================================================
    // Flush pages
    // ========================================================================

    /// Write a specific page back to disk if it's dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = match self.page_table.read().get(&page_id) {
            Some(&fid) => fid,
            None => return Ok(()),
        };

        self.flush_frame(frame_id, page_id)
    }

    /// Write every dirty page back to disk and sync the file.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = self
            .page_table
            .read()
            .iter()
            .map(|(&pid, &fid)| (pid, fid))
            .collect();

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }

        self.disk_manager.lock().sync()?;
        debug!("flushed buffer pool: {}", self.stats.snapshot());
        Ok(())
    }

    // ========================================================================
    // Stats and pin accounting
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of pages currently cached.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Number of pages allocated in the underlying file.
    pub fn file_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.page_table.read().contains_key(&page_id)
    }

    /// Pin count of a cached page, or `None` if it is not in the pool.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame_id = *self.page_table.read().get(&page_id)?;
        Some(self.frames[frame_id.0].pin_count())
    }

    /// Number of cached pages with a non-zero pin count.
    pub fn pinned_page_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_pinned()).count()
    }

    // ========================================================================
    // Internal: called by guards on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        if frame.unpin() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: fetch, evict, flush
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        if let Some(&frame_id) = self.page_table.read().get(&page_id) {
            self.handle_cache_hit(frame_id);
            return Ok(frame_id);
        }

        self.handle_cache_miss(page_id)
    }

    fn handle_cache_hit(&self, frame_id: FrameId) {
        self.frames[frame_id.0].pin();
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        self.stats.record_hit();
    }

    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        self.stats.record_miss();

        let frame_id = self.get_free_frame()?;

        let page_data = match self.disk_manager.lock().read_page(page_id) {
            Ok(page) => page,
            Err(e) => {
                // Hand the frame back so a failed read does not leak it.
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        self.stats.record_read();

        let frame = &self.frames[frame_id.0];
        frame
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(page_data.as_slice());
        frame.install(page_id);

        self.page_table.write().insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(frame_id)
    }

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page()
    }

    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = self
            .replacer
            .lock()
            .evict()
            .ok_or(Error::NoFreeFrames)?;

        self.stats.record_eviction();

        let frame = &self.frames[frame_id.0];
        if let Some(pid) = frame.resident() {
            self.flush_frame(frame_id, pid)?;
            self.page_table.write().remove(&pid);
            trace!("evicted {} from {}", pid, frame_id);
        }
        frame.vacate();

        Ok(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        if !frame.take_dirty() {
            return Ok(());
        }

        let page = frame.page();
        if let Err(e) = self.disk_manager.lock().write_page(page_id, &page) {
            frame.mark_dirty();
            return Err(e);
        }
        self.stats.record_write();
        Ok(())
    }
}
