//! Storage layer - the files the buffer pool caches pages from.
//!
//! - [`PageFile`] - The contract the buffer pool relies on
//! - [`DiskFile`] - Pages stored in a single file on disk
//! - [`MemFile`] - Pages stored in memory, with I/O counters
//! - [`page`] - Page types and layouts

mod disk_file;
mod file;
mod mem_file;
pub mod page;

pub use disk_file::DiskFile;
pub use file::{FileRef, PageFile};
pub use mem_file::MemFile;
