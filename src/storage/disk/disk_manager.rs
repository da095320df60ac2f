use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, PAGE_SIZE};

/// Byte-addressable page store behind the disk scheduler.
///
/// Reads of pages that were never written must zero-fill the buffer.
pub trait DiskManager: Send + Sync {
    /// Reads a page from stable storage into the provided buffer.
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()>;

    /// Writes a page to stable storage from the provided buffer.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Forces buffered writes down to the storage medium.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// File-backed disk manager. Pages live at offset `page_id * PAGE_SIZE` in
/// a single database file; writes are flushed through before returning.
pub struct FileDiskManager {
    file: Mutex<File>,
    /// Number of disk reads performed
    num_reads: AtomicU32,
    /// Number of disk writes performed
    num_writes: AtomicU32,
}

impl FileDiskManager {
    /// Opens (or creates) the database file at the given path.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(db_path.as_ref())?;

        Ok(Self {
            file: Mutex::new(file),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let byte_offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(byte_offset))?;

        let mut total = 0;
        while total < PAGE_SIZE {
            let n = file.read(&mut data[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        // Reading past the end of the file yields a zeroed page.
        data[total..].fill(0);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let byte_offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(byte_offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl Drop for FileDiskManager {
    fn drop(&mut self) {
        let _ = self.file.get_mut().sync_all();
    }
}

/// In-memory disk manager for tests: a byte-map keyed by page id. Reads of
/// absent pages zero-fill, mirroring the file manager's short-read
/// behavior.
#[derive(Default)]
pub struct MemoryDiskManager {
    pages: Mutex<HashMap<PageId, Box<[u8; PAGE_SIZE]>>>,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages that have ever been written.
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        match self.pages.lock().get(&page_id) {
            Some(page) => data.copy_from_slice(&page[..]),
            None => data.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let mut page = Box::new([0u8; PAGE_SIZE]);
        page.copy_from_slice(data);
        self.pages.lock().insert(page_id, page);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_disk_manager_roundtrip() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();

        let page_id = PageId::new(3);
        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[PAGE_SIZE - 1] = 128;
        dm.write_page(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut read_data).unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[PAGE_SIZE - 1], 128);
        assert_eq!(dm.num_reads(), 1);
        assert_eq!(dm.num_writes(), 1);
    }

    #[test]
    fn test_file_disk_manager_unwritten_page_is_zeroed() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();

        let mut data = [7u8; PAGE_SIZE];
        dm.read_page(PageId::new(9), &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_file_disk_manager_persistence() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let page_id = PageId::new(0);

        {
            let dm = FileDiskManager::new(temp_file.path()).unwrap();
            let mut data = [0u8; PAGE_SIZE];
            data[0] = 123;
            dm.write_page(page_id, &data).unwrap();
            dm.sync().unwrap();
        }

        {
            let dm = FileDiskManager::new(temp_file.path()).unwrap();
            let mut data = [0u8; PAGE_SIZE];
            dm.read_page(page_id, &mut data).unwrap();
            assert_eq!(data[0], 123);
        }
    }

    #[test]
    fn test_memory_disk_manager_roundtrip() {
        let dm = MemoryDiskManager::new();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[10] = 99;
        dm.write_page(PageId::new(1), &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(1), &mut read_data).unwrap();
        assert_eq!(read_data[10], 99);

        // Absent pages come back zeroed.
        let mut other = [1u8; PAGE_SIZE];
        dm.read_page(PageId::new(2), &mut other).unwrap();
        assert!(other.iter().all(|&b| b == 0));
    }
}
