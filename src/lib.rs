//! Stratum - an on-disk, page-oriented storage engine
//!
//! This crate provides the storage core of a database system: a buffer pool
//! that caches fixed-size pages between durable storage and memory, and a
//! concurrent B+tree index built on top of it.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Storage Layer** (`storage`): Disk I/O against a byte-addressable
//!   page store
//!   - `DiskManager`: Page read/write interface with file-backed and
//!     in-memory implementations
//!   - `DiskScheduler`: Background worker consuming a disk request queue
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPoolManager`: Fetches pages from disk and caches them in frames
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `Frame`: Per-frame metadata, pin count, and page latch
//!   - `BasicPageGuard`/`ReadPageGuard`/`WritePageGuard`: RAII guards
//!     coupling a pin with the page latch
//!
//! - **Index** (`index`): Ordered key access
//!   - `BPlusTree`: Concurrent B+tree with latch crabbing
//!   - `IndexIterator`: Forward cursor over the leaf chain
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stratum::buffer::BufferPoolManager;
//! use stratum::common::{PageId, RecordId, SlotId};
//! use stratum::index::{BPlusTree, NumericComparator};
//! use stratum::storage::disk::MemoryDiskManager;
//!
//! let disk = Arc::new(MemoryDiskManager::new());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk));
//!
//! let tree = BPlusTree::new(bpm, Arc::new(NumericComparator), 32, 32).unwrap();
//! let rid = RecordId::new(PageId::new(7), SlotId::new(0));
//!
//! assert!(tree.insert(42, rid).unwrap());
//! assert_eq!(tree.get_value(42).unwrap(), Some(rid));
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SlotId, StratumError};
