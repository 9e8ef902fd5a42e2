//! RAII guards for page access.
//!
//! These guards pair a pin with a frame latch:
//! - [`PageReadGuard`] - Shared read access (multiple allowed)
//! - [`PageWriteGuard`] - Exclusive write access (unpins as dirty)
//!
//! Both guards release the latch first and then unpin the page when dropped,
//! so a frame never becomes evictable while its latch is still held.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;
use crate::storage::FileRef;

use super::buffer_pool_manager::{BufferPoolManager, PageHandle};

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
/// The page is unpinned (clean) when the guard is dropped.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(&file, page_id)?;
/// let data = guard.payload();  // Deref to &Page
/// // guard drops here, page unpinned
/// ```
pub struct PageReadGuard<'a> {
    bpm: &'a BufferPoolManager,
    file: FileRef,
    handle: PageHandle,
    /// `None` once the guard has been released.
    lock: Option<RwLockReadGuard<'a, Page>>,
}

impl<'a> PageReadGuard<'a> {
    /// Called by `BufferPoolManager::fetch_page_read()`.
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        file: FileRef,
        handle: PageHandle,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            file,
            handle,
            lock: Some(lock),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.handle.page_id()
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.handle.frame_id()
    }

    #[inline]
    pub fn handle(&self) -> PageHandle {
        self.handle
    }

    /// Release the latch, then the pin. Calling it again does nothing.
    ///
    /// The guard must not be dereferenced afterwards.
    pub fn drop_guard(&mut self) {
        if let Some(lock) = self.lock.take() {
            drop(lock);
            if let Err(e) = self.bpm.unpin_page(&self.file, self.handle.page_id(), false) {
                warn!(page_id = %self.handle.page_id(), error = %e, "unpin on read guard release failed");
            }
        }
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        self.lock.as_deref().expect("page guard used after drop_guard")
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time.
/// The page is unpinned and marked dirty when the guard is dropped.
///
/// # Example
/// ```ignore
/// let mut guard = bpm.fetch_page_write(&file, page_id)?;
/// guard.payload_mut()[0] = 0xFF;  // DerefMut to &mut Page
/// // guard drops here, page marked dirty and unpinned
/// ```
pub struct PageWriteGuard<'a> {
    bpm: &'a BufferPoolManager,
    file: FileRef,
    handle: PageHandle,
    /// `None` once the guard has been released.
    lock: Option<RwLockWriteGuard<'a, Page>>,
}

impl<'a> PageWriteGuard<'a> {
    /// Called by `BufferPoolManager::fetch_page_write()` and `new_page()`.
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        file: FileRef,
        handle: PageHandle,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            file,
            handle,
            lock: Some(lock),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.handle.page_id()
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.handle.frame_id()
    }

    #[inline]
    pub fn handle(&self) -> PageHandle {
        self.handle
    }

    /// Release the latch, then the pin. Calling it again does nothing.
    ///
    /// The guard must not be dereferenced afterwards.
    pub fn drop_guard(&mut self) {
        if let Some(lock) = self.lock.take() {
            drop(lock);
            if let Err(e) = self.bpm.unpin_page(&self.file, self.handle.page_id(), true) {
                warn!(page_id = %self.handle.page_id(), error = %e, "unpin on write guard release failed");
            }
        }
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        self.lock.as_deref().expect("page guard used after drop_guard")
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.lock.as_deref_mut().expect("page guard used after drop_guard")
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}
