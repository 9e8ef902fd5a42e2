//! Page directory - maps `(file, page)` to the frame caching it.

use crate::common::config::directory_buckets;
use crate::common::{Error, FileId, FrameId, PageId, Result};

#[derive(Debug, Clone, Copy)]
struct DirectoryEntry {
    file_id: FileId,
    page_id: PageId,
    frame_id: FrameId,
}

/// Chained hash table from `(FileId, PageId)` to [`FrameId`].
///
/// The bucket count is fixed at construction, scaled to 1.2x the frame count,
/// so with at most one entry per frame the chains stay short. Keys are
/// unique; entries have no iteration order.
pub struct PageDirectory {
    buckets: Vec<Vec<DirectoryEntry>>,
    len: usize,
}

impl PageDirectory {
    /// Create a directory sized for a pool of `pool_size` frames.
    pub fn new(pool_size: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); directory_buckets(pool_size)],
            len: 0,
        }
    }

    fn bucket(&self, file_id: FileId, page_id: PageId) -> usize {
        let key = ((file_id.0 as u64) << 32) | page_id.0 as u64;
        // Fibonacci hashing: spread sequential page ids across buckets
        let mixed = key.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        ((mixed >> 32) as usize) % self.buckets.len()
    }

    /// Frame holding the page, or `None` if it isn't cached.
    pub fn lookup(&self, file_id: FileId, page_id: PageId) -> Option<FrameId> {
        self.buckets[self.bucket(file_id, page_id)]
            .iter()
            .find(|e| e.file_id == file_id && e.page_id == page_id)
            .map(|e| e.frame_id)
    }

    /// Bind the page to `frame_id`.
    ///
    /// # Errors
    /// `Error::DuplicateKey` if the page is already bound to a frame.
    pub fn insert(&mut self, file_id: FileId, page_id: PageId, frame_id: FrameId) -> Result<()> {
        let idx = self.bucket(file_id, page_id);
        let chain = &mut self.buckets[idx];

        if let Some(existing) = chain
            .iter()
            .find(|e| e.file_id == file_id && e.page_id == page_id)
        {
            return Err(Error::DuplicateKey {
                file_id,
                page_id,
                frame_id: existing.frame_id,
            });
        }

        chain.push(DirectoryEntry {
            file_id,
            page_id,
            frame_id,
        });
        self.len += 1;
        Ok(())
    }

    /// Remove the binding of the page and return the frame it pointed to.
    ///
    /// # Errors
    /// `Error::KeyNotFound` if the page isn't bound.
    pub fn remove(&mut self, file_id: FileId, page_id: PageId) -> Result<FrameId> {
        let idx = self.bucket(file_id, page_id);
        let chain = &mut self.buckets[idx];

        let pos = chain
            .iter()
            .position(|e| e.file_id == file_id && e.page_id == page_id)
            .ok_or(Error::KeyNotFound { file_id, page_id })?;

        self.len -= 1;
        Ok(chain.swap_remove(pos).frame_id)
    }

    /// Number of bound pages.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All bindings, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (FileId, PageId, FrameId)> + '_ {
        self.buckets
            .iter()
            .flatten()
            .map(|e| (e.file_id, e.page_id, e.frame_id))
    }
}
