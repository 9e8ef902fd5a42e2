//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between callers and page files. It
//! manages a fixed pool of frames, each holding at most one page.
//!
//! # Components
//! - [`BufferPoolManager`] - The page cache and its pin/unpin protocol
//! - [`FrameDescriptor`] - Per-frame metadata (file, page, flags, pin count)
//! - [`PageDirectory`] - `(file, page)` to frame hash index
//! - [`ClockReplacer`] - Victim selection
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards for page access
//! - [`BufferPoolStats`] - Access and I/O counters

mod buffer_pool_manager;
mod frame;
mod page_directory;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::{BufferPoolManager, PageHandle};
pub use frame::{FrameDescriptor, FrameInfo};
pub use page_directory::PageDirectory;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use replacer::ClockReplacer;
pub use stats::{BufferPoolStats, StatsSnapshot};
