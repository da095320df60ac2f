use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::common::{PageId, Result, StratumError, PAGE_SIZE};

use super::DiskManager;

/// A disk I/O request. Buffers are owned by the request and, for reads,
/// handed back through the completion channel once filled.
pub enum DiskRequest {
    Read {
        page_id: PageId,
        /// Receives the filled buffer, or None on read failure.
        completion: mpsc::Sender<Option<Box<[u8; PAGE_SIZE]>>>,
    },
    Write {
        page_id: PageId,
        data: Box<[u8; PAGE_SIZE]>,
        /// Receives the write outcome.
        completion: mpsc::Sender<bool>,
    },
}

/// DiskScheduler manages a background worker thread that processes disk
/// I/O requests from a bounded queue. The single worker preserves the
/// submission order of writes to any given page.
pub struct DiskScheduler {
    /// Channel sender for queuing requests
    request_sender: Sender<DiskRequest>,
    /// Flag to signal shutdown
    shutdown: Arc<AtomicBool>,
    /// Handle to the background worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler over the given disk manager and spawns
    /// its worker thread.
    pub fn new(disk_manager: Arc<dyn DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(128);
        let shutdown = Arc::new(AtomicBool::new(false));

        let shutdown_clone = Arc::clone(&shutdown);
        let worker_handle = thread::spawn(move || {
            Self::run_worker(disk_manager, receiver, shutdown_clone);
        });

        Self {
            request_sender: sender,
            shutdown,
            worker_handle: Some(worker_handle),
        }
    }

    /// Queues a disk request for the background worker.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .send(request)
            .map_err(|e| StratumError::DiskScheduler(format!("failed to schedule request: {}", e)))
    }

    /// Schedules a read request and waits for completion.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (tx, rx) = mpsc::channel();
        self.schedule(DiskRequest::Read {
            page_id,
            completion: tx,
        })?;

        let reply = rx.recv().map_err(|e| {
            StratumError::DiskScheduler(format!("failed to receive completion: {}", e))
        })?;
        match reply {
            Some(buf) => {
                data.copy_from_slice(&buf[..]);
                Ok(())
            }
            None => Err(StratumError::DiskReadFailed(page_id)),
        }
    }

    /// Schedules a write request and waits for completion.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let mut buf = Box::new([0u8; PAGE_SIZE]);
        buf.copy_from_slice(data);

        let (tx, rx) = mpsc::channel();
        self.schedule(DiskRequest::Write {
            page_id,
            data: buf,
            completion: tx,
        })?;

        let ok = rx.recv().map_err(|e| {
            StratumError::DiskScheduler(format!("failed to receive completion: {}", e))
        })?;
        if ok {
            Ok(())
        } else {
            Err(StratumError::DiskScheduler(format!(
                "write failed for {}",
                page_id
            )))
        }
    }

    /// The background worker loop. Processes requests until shutdown is
    /// signaled, then drains whatever is left in the queue.
    fn run_worker(
        disk_manager: Arc<dyn DiskManager>,
        receiver: Receiver<DiskRequest>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                while let Ok(request) = receiver.try_recv() {
                    Self::process_request(&*disk_manager, request);
                }
                break;
            }

            match receiver.recv_timeout(std::time::Duration::from_millis(100)) {
                Ok(request) => {
                    Self::process_request(&*disk_manager, request);
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    // Re-check the shutdown flag.
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    break;
                }
            }
        }
    }

    /// Processes a single disk request and signals its completion channel.
    fn process_request(disk_manager: &dyn DiskManager, request: DiskRequest) {
        match request {
            DiskRequest::Read {
                page_id,
                completion,
            } => {
                let mut buf = Box::new([0u8; PAGE_SIZE]);
                let reply = match disk_manager.read_page(page_id, &mut buf[..]) {
                    Ok(()) => Some(buf),
                    Err(_) => None,
                };
                let _ = completion.send(reply);
            }
            DiskRequest::Write {
                page_id,
                data,
                completion,
            } => {
                let ok = disk_manager.write_page(page_id, &data[..]).is_ok();
                let _ = completion.send(ok);
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::MemoryDiskManager;

    #[test]
    fn test_disk_scheduler_read_write() {
        let dm = Arc::new(MemoryDiskManager::new());
        let scheduler = DiskScheduler::new(dm);

        let page_id = PageId::new(0);

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        scheduler.schedule_write_sync(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(page_id, &mut read_data)
            .unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
    }

    #[test]
    fn test_disk_scheduler_write_order_per_page() {
        let dm = Arc::new(MemoryDiskManager::new());
        let scheduler = DiskScheduler::new(dm);

        let page_id = PageId::new(1);
        for i in 0..10u8 {
            let mut data = [0u8; PAGE_SIZE];
            data[0] = i;
            scheduler.schedule_write_sync(page_id, &data).unwrap();
        }

        let mut read_data = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(page_id, &mut read_data)
            .unwrap();
        assert_eq!(read_data[0], 9);
    }

    #[test]
    fn test_disk_scheduler_multiple_pages() {
        let dm = Arc::new(MemoryDiskManager::new());
        let scheduler = DiskScheduler::new(dm);

        let data1 = [1u8; PAGE_SIZE];
        let data2 = [2u8; PAGE_SIZE];
        scheduler.schedule_write_sync(PageId::new(1), &data1).unwrap();
        scheduler.schedule_write_sync(PageId::new(2), &data2).unwrap();

        let mut read1 = [0u8; PAGE_SIZE];
        let mut read2 = [0u8; PAGE_SIZE];
        scheduler.schedule_read_sync(PageId::new(1), &mut read1).unwrap();
        scheduler.schedule_read_sync(PageId::new(2), &mut read2).unwrap();

        assert_eq!(read1[0], 1);
        assert_eq!(read2[0], 2);
    }
}
