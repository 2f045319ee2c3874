//! Burrow - a disk-oriented database storage core in Rust
//!
//! This crate provides the storage substrate of a disk-oriented database:
//! a buffer pool that caches fixed-size pages in memory, and a persistent
//! trie that serves as a concurrent, versioned key-value index.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O
//!   - `DiskManager`: reads and writes pages against the database file
//!   - `DiskScheduler`: funnels all I/O through one background worker
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: resolves page ids to pinned in-memory frames
//!   - `LruKReplacer`: LRU-K eviction policy
//!   - `FrameHeader`: per-frame metadata and page bytes
//!
//! - **Trie** (`trie`): copy-on-write key-value index
//!   - `Trie`: immutable snapshot handle with structural sharing
//!   - `TrieStore`: single-writer / multi-reader facade over a `Trie`
//!
//! - **Recovery** (`recovery`): `LogManager`, a no-op write-ahead log sink
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use burrow::buffer::BufferPoolManager;
//! use burrow::common::AccessType;
//! use burrow::storage::disk::DiskManager;
//! use burrow::trie::TrieStore;
//!
//! # fn main() -> burrow::Result<()> {
//! // A buffer pool with 100 frames and LRU-2 replacement
//! let disk_manager = Arc::new(DiskManager::new("test.db")?);
//! let bpm = BufferPoolManager::new(100, 2, disk_manager, None);
//!
//! // Allocate a page, write to it, release the pin, flush
//! let (page_id, frame) = bpm.new_page()?.expect("no frame available");
//! frame.data_mut()[0] = 42;
//! bpm.unpin_page(page_id, true, AccessType::Unknown);
//! bpm.flush_page(page_id)?;
//!
//! // The trie store is an in-memory versioned index
//! let store = TrieStore::new();
//! store.put("answer", 42u32);
//! assert_eq!(store.get::<u32>("answer").map(|v| *v), Some(42));
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod common;
pub mod recovery;
pub mod storage;
pub mod trie;

// Re-export commonly used types at the crate root
pub use common::{BurrowError, FrameId, PageId, Result};
