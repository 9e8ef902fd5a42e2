//! Frame descriptors - per-frame bookkeeping for the buffer pool.
//!
//! A [`FrameDescriptor`] records what one frame of the pool holds:
//! - Which file and page are loaded (if any)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking
//! - Referenced bit for the clock sweep
//!
//! The descriptor table lives behind the manager's state lock, so plain
//! fields are enough here; the page bytes themselves are stored separately.

use std::fmt;

use crate::common::{FileId, FrameId, PageId};
use crate::storage::FileRef;

/// Metadata for one frame of the pool.
///
/// # Invariants
/// - An invalid frame is clean, unreferenced, unpinned and bound to no file.
/// - The `(file, page_id)` pair only means something while the frame is valid.
pub struct FrameDescriptor {
    frame_id: FrameId,
    file: Option<FileRef>,
    page_id: PageId,
    valid: bool,
    dirty: bool,
    referenced: bool,
    pin_count: u32,
}

impl FrameDescriptor {
    /// Create the descriptor of an empty frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            file: None,
            page_id: PageId::INVALID,
            valid: false,
            dirty: false,
            referenced: false,
            pin_count: 0,
        }
    }

    /// Bind the frame to a freshly loaded page: valid, clean, referenced,
    /// pinned once.
    pub fn set(&mut self, file: FileRef, page_id: PageId) {
        self.file = Some(file);
        self.page_id = page_id;
        self.valid = true;
        self.dirty = false;
        self.referenced = true;
        self.pin_count = 1;
    }

    /// Return the frame to the empty state.
    pub fn clear(&mut self) {
        self.file = None;
        self.page_id = PageId::INVALID;
        self.valid = false;
        self.dirty = false;
        self.referenced = false;
        self.pin_count = 0;
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// The file collaborator this frame's page belongs to.
    #[inline]
    pub fn file(&self) -> Option<&FileRef> {
        self.file.as_ref()
    }

    #[inline]
    pub fn file_id(&self) -> Option<FileId> {
        self.file.as_ref().map(|f| f.file_id())
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Whether the frame holds exactly this page.
    #[inline]
    pub fn holds(&self, file_id: FileId, page_id: PageId) -> bool {
        self.valid && self.page_id == page_id && self.file_id() == Some(file_id)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    /// Record a new holder: pin once more and set the referenced bit.
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.referenced = true;
        self.pin_count
    }

    /// Drop one holder. Returns the new pin count, or `None` if the frame
    /// was not pinned.
    pub fn unpin(&mut self) -> Option<u32> {
        self.pin_count = self.pin_count.checked_sub(1)?;
        Some(self.pin_count)
    }

    /// Mark the page as modified. Dirty stays set until the page is written back.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Give up the frame's second chance.
    #[inline]
    pub fn clear_referenced(&mut self) {
        self.referenced = false;
    }

    /// Corrupt the descriptor: invalid but still bound to its file.
    #[cfg(test)]
    pub(crate) fn force_invalid(&mut self) {
        self.valid = false;
    }

    /// Copy of the descriptor for callers outside the pool.
    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            frame_id: self.frame_id,
            file_id: self.file_id(),
            page_id: self.valid.then_some(self.page_id),
            valid: self.valid,
            dirty: self.dirty,
            referenced: self.referenced,
            pin_count: self.pin_count,
        }
    }
}

/// A point-in-time view of one frame's descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_id: FrameId,
    pub file_id: Option<FileId>,
    pub page_id: Option<PageId>,
    pub valid: bool,
    pub dirty: bool,
    pub referenced: bool,
    pub pin_count: u32,
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.file_id, self.page_id) {
            (Some(file_id), Some(page_id)) => write!(
                f,
                "{}: {} {} valid={} dirty={} referenced={} pin_count={}",
                self.frame_id,
                file_id,
                page_id,
                self.valid,
                self.dirty,
                self.referenced,
                self.pin_count
            ),
            _ => write!(f, "{}: empty", self.frame_id),
        }
    }
}
