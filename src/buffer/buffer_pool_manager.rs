use std::collections::{HashMap, LinkedList, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{
    FrameId, PageId, Result, StratumError, INVALID_PAGE_ID, PAGE_SIZE,
};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{BasicPageGuard, Frame, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Bookkeeping serialized by the pool mutex.
struct PoolInner {
    /// Page table: maps page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that are not currently holding any page
    free_list: LinkedList<FrameId>,
    /// Next page ID to hand out when the recycle queue is empty
    next_page_id: u32,
    /// Page IDs released by delete_page, reused before fresh ones
    free_page_ids: VecDeque<PageId>,
}

/// Shared state referenced by the manager and by every live page guard.
pub(crate) struct PoolCore {
    frames: Vec<Arc<Frame>>,
    inner: Mutex<PoolInner>,
    replacer: LruKReplacer,
}

impl PoolCore {
    /// Decrements a page's pin count, OR-merging the dirty flag. Returns
    /// false if the page is not resident or already unpinned.
    pub(crate) fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        if is_dirty {
            frame.set_dirty(true);
        }
        match frame.unpin() {
            None => false,
            Some(0) => {
                self.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
        }
    }
}

/// BufferPoolManager caches disk pages in a fixed set of frames, handing
/// out RAII guards that couple a pin with the page latch. Eviction
/// decisions follow the LRU-K policy; dirty victims are written back
/// through the disk scheduler before their frame is reused.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    core: Arc<PoolCore>,
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value for
    /// LRU-K, and disk manager.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let core = Arc::new(PoolCore {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
                next_page_id: 0,
                free_page_ids: VecDeque::new(),
            }),
            replacer: LruKReplacer::new(k, pool_size),
        });

        Self {
            pool_size,
            core,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page id and returns a pinned guard over its
    /// zero-initialized frame. Fails with `BufferPoolFull` when every frame
    /// is pinned.
    pub fn new_page(&self) -> Result<BasicPageGuard> {
        let mut guard = self.core.inner.lock();
        let inner = &mut *guard;

        let frame_id = self.usable_frame(inner)?;
        let page_id = match inner.free_page_ids.pop_front() {
            Some(recycled) => recycled,
            None => {
                let id = PageId::new(inner.next_page_id);
                inner.next_page_id += 1;
                id
            }
        };

        let frame = Arc::clone(&self.core.frames[frame_id.as_usize()]);
        frame.set_page_id(page_id);
        // No disk image exists yet: the zeroed frame must survive eviction.
        frame.set_dirty(true);
        inner.page_table.insert(page_id, frame_id);
        drop(guard);

        debug!(page = page_id.as_u32(), "allocated new page");
        Ok(BasicPageGuard::new(Arc::clone(&self.core), page_id, frame))
    }

    /// Fetches a page and returns a pin-only guard.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        let frame = self.fetch_frame(page_id)?;
        Ok(BasicPageGuard::new(Arc::clone(&self.core), page_id, frame))
    }

    /// Fetches a page and returns a guard holding its latch in shared mode.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame = self.fetch_frame(page_id)?;
        // Safety: the guard keeps the frame alive via its Arc.
        Ok(unsafe { ReadPageGuard::new(Arc::clone(&self.core), page_id, frame) })
    }

    /// Fetches a page and returns a guard holding its latch in exclusive
    /// mode.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame = self.fetch_frame(page_id)?;
        // Safety: the guard keeps the frame alive via its Arc.
        Ok(unsafe { WritePageGuard::new(Arc::clone(&self.core), page_id, frame) })
    }

    /// Decrements a page's pin count, OR-merging the dirty flag. Returns
    /// false if the page is not resident or already unpinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.core.unpin_page(page_id, is_dirty)
    }

    /// Writes a page back to disk synchronously and clears its dirty flag.
    /// Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(StratumError::InvalidPageId(page_id));
        }

        // Pin the frame under the pool lock, then flush without it: waiting
        // for the page latch while holding the pool lock could deadlock
        // against a latch holder allocating a page.
        let frame = {
            let mut guard = self.core.inner.lock();
            let inner = &mut *guard;
            let Some(&frame_id) = inner.page_table.get(&page_id) else {
                return Ok(false);
            };
            let frame = Arc::clone(&self.core.frames[frame_id.as_usize()]);
            frame.pin();
            self.core.replacer.record_access(frame_id);
            self.core.replacer.set_evictable(frame_id, false);
            frame
        };

        // Clearing the flag before the copy keeps a concurrent write from
        // being unmarked: whoever dirties the page after the copy re-marks
        // it and gets flushed next time.
        frame.set_dirty(false);
        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        let result = self.disk_scheduler.schedule_write_sync(page_id, &data);
        if result.is_err() {
            frame.set_dirty(true);
        }
        self.core.unpin_page(page_id, false);
        result?;

        Ok(true)
    }

    /// Writes every resident page back to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_ids: Vec<PageId> = {
            let inner = self.core.inner.lock();
            inner.page_table.keys().copied().collect()
        };
        for page_id in page_ids {
            // Pages evicted since the snapshot were written back already.
            self.flush_page(page_id)?;
        }

        debug!("flushed all resident pages");
        Ok(())
    }

    /// Drops a page from the pool and releases its id for reuse. Fails if
    /// the page is resident and pinned; succeeds (and still recycles the
    /// id) if the page is not resident.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut guard = self.core.inner.lock();
        let inner = &mut *guard;

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.core.frames[frame_id.as_usize()];
            if frame.pin_count() > 0 {
                return Err(StratumError::PageStillPinned(page_id));
            }

            inner.page_table.remove(&page_id);
            self.core.replacer.remove(frame_id);
            frame.reset();
            inner.free_list.push_back(frame_id);
        }

        inner.free_page_ids.push_back(page_id);
        Ok(())
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.core.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.core.frames[frame_id.as_usize()].pin_count())
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.core.inner.lock().free_list.len()
    }

    /// Looks up or loads the frame holding `page_id`, pinned and marked
    /// non-evictable. The caller wraps it in a guard.
    fn fetch_frame(&self, page_id: PageId) -> Result<Arc<Frame>> {
        if page_id == INVALID_PAGE_ID {
            return Err(StratumError::InvalidPageId(page_id));
        }

        let mut guard = self.core.inner.lock();
        let inner = &mut *guard;

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.core.frames[frame_id.as_usize()];
            frame.pin();
            self.core.replacer.record_access(frame_id);
            self.core.replacer.set_evictable(frame_id, false);
            trace!(page = page_id.as_u32(), "buffer pool hit");
            return Ok(Arc::clone(frame));
        }

        debug!(page = page_id.as_u32(), "buffer pool miss");
        let frame_id = self.usable_frame(inner)?;
        let frame = Arc::clone(&self.core.frames[frame_id.as_usize()]);

        let mut data = [0u8; PAGE_SIZE];
        match self.disk_scheduler.schedule_read_sync(page_id, &mut data) {
            Ok(()) => {
                frame.set_page_id(page_id);
                frame.copy_from(&data);
                inner.page_table.insert(page_id, frame_id);
                Ok(frame)
            }
            Err(e) => {
                // The mapping was never installed; hand the frame back.
                frame.reset();
                self.core.replacer.set_evictable(frame_id, true);
                self.core.replacer.remove(frame_id);
                inner.free_list.push_back(frame_id);
                Err(e)
            }
        }
    }

    /// Gets a usable frame, either from the free list or by evicting a
    /// page. The returned frame is reset, pinned once, and registered with
    /// the replacer as non-evictable.
    fn usable_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        let frame_id = if let Some(frame_id) = inner.free_list.pop_front() {
            frame_id
        } else {
            let Some(frame_id) = self.core.replacer.evict() else {
                return Err(StratumError::BufferPoolFull);
            };
            let frame = &self.core.frames[frame_id.as_usize()];
            let old_page_id = frame.page_id();

            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                // Losing a dirty page silently would break durability; a
                // failed write-back here is unrecoverable.
                self.disk_scheduler
                    .schedule_write_sync(old_page_id, &data)
                    .expect("write-back of evicted dirty page failed");
            }
            trace!(page = old_page_id.as_u32(), "evicted page");
            inner.page_table.remove(&old_page_id);
            frame_id
        };

        let frame = &self.core.frames[frame_id.as_usize()];
        frame.reset();
        frame.pin();
        self.core.replacer.record_access(frame_id);
        self.core.replacer.set_evictable(frame_id, false);
        Ok(frame_id)
    }
}
