use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolCore;
use super::Frame;

/// RAII guard holding a pin on a page without any latch.
///
/// `data`/`data_mut` take the page latch only for the lifetime of the
/// returned borrow. Dropping the guard unpins the page, reporting whether
/// `data_mut` was ever called.
pub struct BasicPageGuard {
    page_id: PageId,
    frame: Arc<Frame>,
    /// Taken on drop; a guard whose pool is gone is inert.
    pool: Option<Arc<PoolCore>>,
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(pool: Arc<PoolCore>, page_id: PageId, frame: Arc<Frame>) -> Self {
        Self {
            page_id,
            frame,
            pool: Some(pool),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns a read view of the page bytes, holding the page latch in
    /// shared mode for the borrow's lifetime.
    pub fn data(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.frame.data.read(), |d| &d[..])
    }

    /// Returns a write view of the page bytes, holding the page latch in
    /// exclusive mode for the borrow's lifetime. Marks the page dirty.
    pub fn data_mut(&mut self) -> MappedRwLockWriteGuard<'_, [u8]> {
        self.is_dirty = true;
        RwLockWriteGuard::map(self.frame.data.write(), |d| &mut d[..])
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.unpin_page(self.page_id, self.is_dirty);
        }
    }
}

/// RAII guard for read-only access to a page.
///
/// Holds the page latch in shared mode for its whole lifetime; dropping
/// releases the latch and then unpins the page.
pub struct ReadPageGuard {
    base: BasicPageGuard,
    /// Held read lock on the page data. Taken out before the base unpins.
    data_guard: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    /// Creates a new ReadPageGuard, blocking until the shared latch is
    /// available.
    ///
    /// # Safety
    /// The `'static` lifetime is a lie upheld by `base` keeping the frame
    /// (and therefore the lock) alive for at least as long as `data_guard`.
    pub(crate) unsafe fn new(pool: Arc<PoolCore>, page_id: PageId, frame: Arc<Frame>) -> Self {
        let data_guard = frame.data.read();
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            base: BasicPageGuard::new(pool, page_id, frame),
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Latch release must precede the unpin performed by base's drop.
        self.data_guard.take();
    }
}

/// RAII guard for exclusive access to a page.
///
/// Holds the page latch in exclusive mode for its whole lifetime; dropping
/// releases the latch and then unpins the page, dirty if `data_mut` was
/// called.
pub struct WritePageGuard {
    base: BasicPageGuard,
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    /// Creates a new WritePageGuard, blocking until the exclusive latch is
    /// available.
    ///
    /// # Safety
    /// Same lifetime contract as [`ReadPageGuard::new`].
    pub(crate) unsafe fn new(pool: Arc<PoolCore>, page_id: PageId, frame: Arc<Frame>) -> Self {
        let data_guard = frame.data.write();
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            base: BasicPageGuard::new(pool, page_id, frame),
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Returns a mutable reference to the page data and marks the page
    /// dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.base.is_dirty = true;
        &mut self.data_guard.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Latch release must precede the unpin performed by base's drop.
        self.data_guard.take();
    }
}
