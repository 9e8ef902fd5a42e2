//! clockpool - a page buffer pool with CLOCK replacement.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     callers (access methods)                    │
//! │        read_page / unpin_page / alloc_page / dispose_page       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Buffer Pool (buffer/)                        │
//! │   PageDirectory ─▶ FrameDescriptor table ◀─ ClockReplacer       │
//! │         BufferPoolManager + page guards + statistics            │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Storage (storage/)                           │
//! │        PageFile trait: DiskFile | MemFile, Page + header        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (FileId, PageId, FrameId, Error, config)
//! - [`buffer`] - The buffer pool and its replacement policy
//! - [`storage`] - Page files and page formats
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use clockpool::{BufferPoolManager, DiskFile, FileRef};
//!
//! let file: FileRef = Arc::new(DiskFile::open_or_create("my_database.db").unwrap());
//! let bpm = BufferPoolManager::new(64);
//!
//! let (page_id, handle) = bpm.alloc_page(&file).unwrap();
//! bpm.page_mut(&handle).unwrap().payload_mut()[..5].copy_from_slice(b"hello");
//! bpm.unpin_page(&file, page_id, true).unwrap();
//! bpm.flush_file(&file).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{BufferPoolConfig, PAGE_SIZE};
pub use common::{Error, FileId, FrameId, PageId, Result};

pub use buffer::{
    BufferPoolManager, BufferPoolStats, FrameInfo, PageHandle, PageReadGuard, PageWriteGuard,
    StatsSnapshot,
};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::{DiskFile, FileRef, MemFile, PageFile};
