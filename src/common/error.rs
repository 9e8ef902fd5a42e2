//! Error types for the buffer pool.

use thiserror::Error;

use crate::common::{FileId, FrameId, PageId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the buffer pool and its file collaborators.
///
/// The buffer pool reports four kinds of failure to callers:
/// - [`Error::BufferExceeded`] - saturation, every frame is pinned
/// - [`Error::PageNotPinned`] / [`Error::PagePinned`] - caller broke the pin protocol
/// - [`Error::BadBuffer`] - internal consistency violation, never retry
///
/// [`Error::KeyNotFound`] and [`Error::DuplicateKey`] come from the page
/// directory. The manager folds directory misses into normal control flow, so
/// callers only ever see them if the directory and descriptor table disagree.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a file collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every frame in the pool is valid and pinned; nothing can be evicted.
    #[error("buffer pool exceeded: all {pool_size} frames are pinned")]
    BufferExceeded { pool_size: usize },

    /// Attempted to unpin a page whose pin count is already zero.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("{page_id} of file {file} is not pinned ({frame_id})")]
    PageNotPinned {
        file: String,
        page_id: PageId,
        frame_id: FrameId,
    },

    /// `flush_file` found a page of the file that is still pinned.
    #[error("{page_id} of file {file} is pinned ({frame_id})")]
    PagePinned {
        file: String,
        page_id: PageId,
        frame_id: FrameId,
    },

    /// A frame's descriptor contradicts the page directory.
    #[error("bad buffer in {frame_id}: valid={valid}, dirty={dirty}, referenced={referenced}")]
    BadBuffer {
        frame_id: FrameId,
        valid: bool,
        dirty: bool,
        referenced: bool,
    },

    /// No directory entry exists for the key.
    #[error("no directory entry for {page_id} of {file_id}")]
    KeyNotFound { file_id: FileId, page_id: PageId },

    /// The key is already bound to a frame.
    #[error("{page_id} of {file_id} is already bound to {frame_id}")]
    DuplicateKey {
        file_id: FileId,
        page_id: PageId,
        frame_id: FrameId,
    },

    /// Requested page does not exist in the file (never allocated or deleted).
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// On-disk page content failed its CRC32 check.
    #[error("checksum mismatch on {0}")]
    ChecksumMismatch(PageId),

    /// Rejected buffer pool configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error reports broken internal state rather than a caller
    /// mistake or a transient condition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::BadBuffer { .. } | Error::DuplicateKey { .. } | Error::KeyNotFound { .. }
        )
    }
}
