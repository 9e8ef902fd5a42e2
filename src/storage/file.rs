//! The file collaborator contract.

use std::sync::Arc;

use crate::common::{FileId, PageId, Result};
use crate::storage::page::Page;

/// A file of fixed-size pages that the buffer pool caches.
///
/// The pool never touches disk directly; every read, write-back, allocation
/// and deletion goes through this trait. Implementations must be usable from
/// several threads, so methods take `&self` and serialize internally.
pub trait PageFile: Send + Sync {
    /// Identity used to key the page directory.
    fn file_id(&self) -> FileId;

    /// Human-readable name, used in error messages.
    fn filename(&self) -> &str;

    /// Read the on-disk content of `page_id`.
    fn read_page(&self, page_id: PageId) -> Result<Page>;

    /// Persist `page` to the slot named by the page id in its header.
    fn write_page(&self, page: &Page) -> Result<()>;

    /// Reserve a new page slot and return its zeroed content.
    ///
    /// The assigned id is embedded in the returned page's header.
    fn allocate_page(&self) -> Result<Page>;

    /// Release the slot of `page_id`.
    fn delete_page(&self, page_id: PageId) -> Result<()>;
}

/// Shared handle to a file collaborator.
///
/// Frames hold one of these while they cache a page of the file, so dirty
/// content can always be written back to the file it came from.
pub type FileRef = Arc<dyn PageFile>;
