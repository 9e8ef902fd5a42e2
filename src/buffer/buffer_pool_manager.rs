//! Buffer Pool Manager - the page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between page files and memory
//! - Pin-based reference counting
//! - Dirty page write-back before a frame is reused
//! - CLOCK (second chance) victim selection

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace, warn};

use crate::buffer::replacer::ClockReplacer;
use crate::buffer::{
    BufferPoolStats, FrameDescriptor, FrameInfo, PageDirectory, PageReadGuard, PageWriteGuard,
};
use crate::common::config::BufferPoolConfig;
use crate::common::{Error, FileId, FrameId, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};
use crate::storage::FileRef;

/// Proof that a page was pinned by [`BufferPoolManager::read_page`] or
/// [`BufferPoolManager::alloc_page`].
///
/// A handle names a frame by index; it never borrows the frame. Access the
/// bytes with [`BufferPoolManager::page`] / [`BufferPoolManager::page_mut`]
/// while the pin is held, and give the pin back with
/// [`BufferPoolManager::unpin_page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    file_id: FileId,
    page_id: PageId,
    frame_id: FrameId,
}

impl PageHandle {
    #[inline]
    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

/// Everything the clock sweep must see consistently, kept under one lock.
struct PoolState {
    descriptors: Vec<FrameDescriptor>,
    directory: PageDirectory,
    clock: ClockReplacer,
}

/// Manages a pool of buffer frames caching pages of any number of files.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                     BufferPoolManager                        │
/// │  state: Mutex<PoolState>                                     │
/// │  ┌───────────────┐  ┌──────────────────────┐  ┌───────────┐  │
/// │  │  directory    │  │  descriptors         │  │  clock    │  │
/// │  │ (file, page)  │─▶│ [Desc0][Desc1]...    │◀─│  hand     │  │
/// │  │   → FrameId   │  │ file/page/flags/pins │  │           │  │
/// │  └───────────────┘  └──────────────────────┘  └───────────┘  │
/// │  pool: [RwLock<Page>; pool_size]   (indexed by FrameId)      │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `state`: one `Mutex` around the directory, the descriptor table and the
///   clock hand. Every public operation runs as a single critical section, so
///   the sweep always sees consistent pin counts and referenced bits.
/// - `pool`: one `RwLock` per frame for the page bytes. Callers latch a
///   frame only while they hold a pin on it.
/// - Lock order: a thread may wait for `state` while holding frame latches,
///   never the other way round. Under `state` the pool only *tries* a
///   latch, and a frame whose latch is taken is not a candidate for reuse.
/// - `stats`: atomic counters, no lock.
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use clockpool::{BufferPoolManager, FileRef, MemFile};
///
/// let file: FileRef = Arc::new(MemFile::new("example.db"));
/// let bpm = BufferPoolManager::new(4);
///
/// // Allocate a page, write to it, give the pin back as dirty
/// let (page_id, handle) = bpm.alloc_page(&file).unwrap();
/// bpm.page_mut(&handle).unwrap().payload_mut()[0] = 0xAB;
/// bpm.unpin_page(&file, page_id, true).unwrap();
///
/// // Read it again
/// let handle = bpm.read_page(&file, page_id).unwrap();
/// assert_eq!(bpm.page(&handle).unwrap().payload()[0], 0xAB);
/// bpm.unpin_page(&file, page_id, false).unwrap();
/// ```
pub struct BufferPoolManager {
    /// Page bytes of every frame.
    pool: Box<[RwLock<Page>]>,

    /// Directory, descriptor table and clock hand.
    state: Mutex<PoolState>,

    /// Performance statistics.
    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager with `pool_size` empty frames.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let pool = (0..pool_size).map(|_| RwLock::new(Page::new())).collect();
        let descriptors = (0..pool_size)
            .map(|i| FrameDescriptor::new(FrameId::new(i)))
            .collect();

        Self {
            pool,
            state: Mutex::new(PoolState {
                descriptors,
                directory: PageDirectory::new(pool_size),
                clock: ClockReplacer::new(pool_size),
            }),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    /// Create a buffer pool manager from a validated config.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the config is rejected.
    pub fn with_config(config: BufferPoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.pool_size))
    }

    // ========================================================================
    // Public API: pin protocol
    // ========================================================================

    /// Pin a page of `file`, loading it if it isn't cached.
    ///
    /// On a hit the frame's pin count goes up and its referenced bit is set.
    /// On a miss a frame is freed by the clock sweep, the page is read into
    /// it and the frame starts with a pin count of 1.
    ///
    /// # Errors
    /// - `Error::BufferExceeded` if every frame is pinned
    /// - Errors from the file's `read_page` (the freed frame stays empty)
    pub fn read_page(&self, file: &FileRef, page_id: PageId) -> Result<PageHandle> {
        let file_id = file.file_id();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(frame_id) = state.directory.lookup(file_id, page_id) {
            let pins = state.descriptors[frame_id.index()].pin();
            self.stats.record_access(true);
            trace!(file = file.filename(), %page_id, %frame_id, pins, "page hit");
            return Ok(PageHandle {
                file_id,
                page_id,
                frame_id,
            });
        }

        self.stats.record_access(false);
        let (frame_id, mut latch) = self.alloc_frame(state)?;

        let page = file.read_page(page_id)?;
        self.stats.record_disk_read();
        *latch = page;

        self.install(state, file, page_id, frame_id)?;
        debug!(file = file.filename(), %page_id, %frame_id, "page loaded");

        Ok(PageHandle {
            file_id,
            page_id,
            frame_id,
        })
    }

    /// Give back one pin on a page.
    ///
    /// Unpinning a page that isn't cached does nothing. `dirty = true` marks
    /// the page for write-back; `dirty = false` never clears an earlier mark.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the page is cached with a pin count of 0.
    pub fn unpin_page(&self, file: &FileRef, page_id: PageId, dirty: bool) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(frame_id) = state.directory.lookup(file.file_id(), page_id) else {
            trace!(file = file.filename(), %page_id, "unpin of uncached page ignored");
            return Ok(());
        };

        let desc = &mut state.descriptors[frame_id.index()];
        let pins = desc.unpin().ok_or_else(|| Error::PageNotPinned {
            file: file.filename().to_string(),
            page_id,
            frame_id,
        })?;
        if dirty {
            desc.mark_dirty();
        }

        trace!(file = file.filename(), %page_id, %frame_id, pins, dirty, "page unpinned");
        Ok(())
    }

    /// Allocate a new page in `file` and pin it in the pool.
    ///
    /// A frame is freed before the file is asked for a page, so a saturated
    /// pool never leaves an orphan page behind in the file.
    ///
    /// # Errors
    /// - `Error::BufferExceeded` if every frame is pinned
    /// - Errors from the file's `allocate_page`
    pub fn alloc_page(&self, file: &FileRef) -> Result<(PageId, PageHandle)> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        self.stats.record_access(false);
        let (frame_id, mut latch) = self.alloc_frame(state)?;

        let page = file.allocate_page()?;
        let page_id = page.page_id();
        *latch = page;

        self.install(state, file, page_id, frame_id)?;
        debug!(file = file.filename(), %page_id, %frame_id, "page allocated");

        Ok((
            page_id,
            PageHandle {
                file_id: file.file_id(),
                page_id,
                frame_id,
            },
        ))
    }

    /// Drop a page from the pool and delete it from its file.
    ///
    /// The cached copy is discarded even if it is dirty or pinned: the page
    /// is being destroyed, so unwritten changes are lost.
    ///
    /// # Errors
    /// Errors from the file's `delete_page`.
    pub fn dispose_page(&self, file: &FileRef, page_id: PageId) -> Result<()> {
        let file_id = file.file_id();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(frame_id) = state.directory.lookup(file_id, page_id) {
            let desc = &mut state.descriptors[frame_id.index()];
            if desc.is_pinned() {
                warn!(
                    file = file.filename(),
                    %page_id,
                    %frame_id,
                    pins = desc.pin_count(),
                    "disposing a pinned page"
                );
            }
            state.directory.remove(file_id, page_id)?;
            desc.clear();
        }

        file.delete_page(page_id)?;
        debug!(file = file.filename(), %page_id, "page disposed");
        Ok(())
    }

    /// Write back and drop every cached page of `file`.
    ///
    /// Frames are processed in index order. Dirty pages are written to the
    /// file; every page of the file then leaves the pool.
    ///
    /// # Errors
    /// - `Error::PagePinned` at the first pinned or latched page of the
    ///   file. Frames before it are already flushed; frames after it are
    ///   untouched.
    /// - `Error::BadBuffer` if a frame bound to the file is not valid
    /// - Errors from the file's `write_page`
    pub fn flush_file(&self, file: &FileRef) -> Result<()> {
        let file_id = file.file_id();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut flushed = 0usize;

        for idx in 0..self.pool_size {
            let desc = &state.descriptors[idx];
            if desc.file_id() != Some(file_id) {
                continue;
            }
            if !desc.is_valid() {
                return Err(bad_buffer(desc));
            }
            let page_id = desc.page_id();
            let frame_id = desc.frame_id();
            let pinned = || Error::PagePinned {
                file: file.filename().to_string(),
                page_id,
                frame_id,
            };
            if desc.is_pinned() {
                return Err(pinned());
            }

            if desc.is_dirty() {
                let Some(page) = self.pool[idx].try_read() else {
                    return Err(pinned());
                };
                write_back(file, page_id, &page, &self.stats)?;
                flushed += 1;
            }

            state.directory.remove(file_id, page_id)?;
            state.descriptors[idx].clear();
        }

        debug!(file = file.filename(), flushed, "file flushed");
        Ok(())
    }

    /// Write back every dirty page in the pool. Pages stay cached and pinned
    /// pages are written too.
    ///
    /// The dirty frames are collected first and then latched one at a time
    /// with the state lock released, so a writer holding a latch while it
    /// pins another page is waited for, not deadlocked. The calling thread
    /// must not hold a page latch of its own.
    ///
    /// # Errors
    /// Errors from a file's `write_page`; pages written before the failure
    /// stay clean.
    pub fn flush_all_pages(&self) -> Result<()> {
        let dirty: Vec<(FileRef, FrameId, PageId)> = self
            .state
            .lock()
            .descriptors
            .iter()
            .filter(|d| d.is_valid() && d.is_dirty())
            .filter_map(|d| Some((Arc::clone(d.file()?), d.frame_id(), d.page_id())))
            .collect();

        let mut flushed = 0usize;
        for (file, frame_id, page_id) in dirty {
            let page = self.pool[frame_id.index()].read();
            let mut state = self.state.lock();
            let desc = &mut state.descriptors[frame_id.index()];

            // Evicted, disposed or written back since the scan
            if !(desc.holds(file.file_id(), page_id) && desc.is_dirty()) {
                continue;
            }
            write_back(&file, page_id, &page, &self.stats)?;
            desc.clear_dirty();
            flushed += 1;
        }

        debug!(flushed, "all pages flushed");
        Ok(())
    }

    // ========================================================================
    // Public API: page access
    // ========================================================================

    /// Shared access to the bytes of a pinned page.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the handle's frame no longer holds its page
    /// pinned.
    pub fn page(&self, handle: &PageHandle) -> Result<RwLockReadGuard<'_, Page>> {
        let latch = self.frame_latch(handle)?.read();
        self.check_handle(handle)?;
        Ok(latch)
    }

    /// Exclusive access to the bytes of a pinned page.
    ///
    /// Writing does not mark the page dirty; pass `dirty = true` to
    /// [`unpin_page`](Self::unpin_page) for that.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the handle's frame no longer holds its page
    /// pinned.
    pub fn page_mut(&self, handle: &PageHandle) -> Result<RwLockWriteGuard<'_, Page>> {
        let latch = self.frame_latch(handle)?.write();
        self.check_handle(handle)?;
        Ok(latch)
    }

    /// Pin a page and latch it for reading. Unpins on drop.
    ///
    /// # Errors
    /// Same as [`read_page`](Self::read_page), plus `Error::PageNotPinned`
    /// if the page is disposed before the latch is granted.
    pub fn fetch_page_read(&self, file: &FileRef, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let handle = self.read_page(file, page_id)?;
        let lock = self.pool[handle.frame_id.index()].read();
        self.check_handle(&handle)?;
        Ok(PageReadGuard::new(self, Arc::clone(file), handle, lock))
    }

    /// Pin a page and latch it for writing. Unpins as dirty on drop.
    ///
    /// # Errors
    /// Same as [`read_page`](Self::read_page), plus `Error::PageNotPinned`
    /// if the page is disposed before the latch is granted.
    pub fn fetch_page_write(&self, file: &FileRef, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let handle = self.read_page(file, page_id)?;
        let lock = self.pool[handle.frame_id.index()].write();
        self.check_handle(&handle)?;
        Ok(PageWriteGuard::new(self, Arc::clone(file), handle, lock))
    }

    /// Allocate a page and latch it for writing. Unpins as dirty on drop.
    ///
    /// # Errors
    /// Same as [`alloc_page`](Self::alloc_page), plus `Error::PageNotPinned`
    /// if the page is disposed before the latch is granted.
    pub fn new_page(&self, file: &FileRef) -> Result<PageWriteGuard<'_>> {
        let (_, handle) = self.alloc_page(file)?;
        let lock = self.pool[handle.frame_id.index()].write();
        self.check_handle(&handle)?;
        Ok(PageWriteGuard::new(self, Arc::clone(file), handle, lock))
    }

    // ========================================================================
    // Public API: stats and introspection
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of cached pages.
    pub fn page_count(&self) -> usize {
        self.state.lock().directory.len()
    }

    /// Number of frames holding a page.
    pub fn valid_frame_count(&self) -> usize {
        self.state
            .lock()
            .descriptors
            .iter()
            .filter(|d| d.is_valid())
            .count()
    }

    /// Whether the page is cached.
    pub fn contains_page(&self, file: &FileRef, page_id: PageId) -> bool {
        self.state
            .lock()
            .directory
            .lookup(file.file_id(), page_id)
            .is_some()
    }

    /// Pin count of a cached page, or `None` if it isn't cached.
    pub fn pin_count(&self, file: &FileRef, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let frame_id = state.directory.lookup(file.file_id(), page_id)?;
        Some(state.descriptors[frame_id.index()].pin_count())
    }

    /// Snapshot of every frame descriptor, in frame order.
    pub fn frames(&self) -> Vec<FrameInfo> {
        self.state
            .lock()
            .descriptors
            .iter()
            .map(FrameDescriptor::info)
            .collect()
    }

    /// Snapshot of one frame descriptor.
    pub fn frame_info(&self, frame_id: FrameId) -> Option<FrameInfo> {
        self.state
            .lock()
            .descriptors
            .get(frame_id.index())
            .map(FrameDescriptor::info)
    }

    /// Current position of the clock hand.
    pub fn clock_hand(&self) -> FrameId {
        self.state.lock().clock.hand()
    }

    /// Log every frame descriptor at debug level.
    pub fn log_frames(&self) {
        let frames = self.frames();
        for info in &frames {
            debug!("{}", info);
        }
        debug!(
            valid = frames.iter().filter(|f| f.valid).count(),
            "total valid frames"
        );
    }

    /// Verify that the page directory mirrors the descriptor table exactly.
    ///
    /// # Errors
    /// `Error::BadBuffer` naming the first frame that disagrees.
    pub fn check_consistency(&self) -> Result<()> {
        let state = self.state.lock();

        for desc in &state.descriptors {
            if desc.is_valid() {
                let Some(file_id) = desc.file_id() else {
                    return Err(bad_buffer(desc));
                };
                if state.directory.lookup(file_id, desc.page_id()) != Some(desc.frame_id()) {
                    return Err(bad_buffer(desc));
                }
            } else if desc.is_dirty()
                || desc.is_referenced()
                || desc.is_pinned()
                || desc.file().is_some()
            {
                return Err(bad_buffer(desc));
            }
        }

        for (file_id, page_id, frame_id) in state.directory.entries() {
            match state.descriptors.get(frame_id.index()) {
                Some(desc) if desc.holds(file_id, page_id) => {}
                Some(desc) => return Err(bad_buffer(desc)),
                None => {
                    return Err(Error::BadBuffer {
                        frame_id,
                        valid: false,
                        dirty: false,
                        referenced: false,
                    })
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Internal: frame allocation and eviction
    // ========================================================================

    /// Free a frame for reuse.
    ///
    /// If the clock picks a valid frame, its page is written back when dirty,
    /// unbound from the directory and the descriptor is cleared. Write-back
    /// always reads the victim's own frame, by frame index.
    ///
    /// The frame comes back write-latched. Only frames whose latch could be
    /// taken without waiting are considered.
    fn alloc_frame(
        &self,
        state: &mut PoolState,
    ) -> Result<(FrameId, RwLockWriteGuard<'_, Page>)> {
        // A latched frame is in use even if its page was disposed under it
        let unavailable = |d: &FrameDescriptor| {
            (d.is_valid() && d.is_pinned()) || self.pool[d.frame_id().index()].is_locked()
        };
        if state.descriptors.iter().all(unavailable) {
            return Err(Error::BufferExceeded {
                pool_size: self.pool_size,
            });
        }

        let mut claimed = None;
        let frame_id = state.clock.find_victim(&mut state.descriptors, |frame_id| {
            claimed = self.pool[frame_id.index()].try_write();
            claimed.is_some()
        })?;
        let desc = &state.descriptors[frame_id.index()];
        let Some(latch) = claimed else {
            return Err(bad_buffer(desc));
        };

        if !desc.is_valid() {
            return Ok((frame_id, latch));
        }

        let file = desc.file().cloned().ok_or_else(|| bad_buffer(desc))?;
        let page_id = desc.page_id();
        let dirty = desc.is_dirty();

        if dirty {
            write_back(&file, page_id, &latch, &self.stats)?;
        }

        state.directory.remove(file.file_id(), page_id)?;
        state.descriptors[frame_id.index()].clear();
        self.stats.record_eviction();

        debug!(file = file.filename(), %page_id, %frame_id, dirty, "page evicted");
        Ok((frame_id, latch))
    }

    /// Bind a freshly loaded frame to its page.
    fn install(
        &self,
        state: &mut PoolState,
        file: &FileRef,
        page_id: PageId,
        frame_id: FrameId,
    ) -> Result<()> {
        state.directory.insert(file.file_id(), page_id, frame_id)?;
        state.descriptors[frame_id.index()].set(Arc::clone(file), page_id);
        Ok(())
    }

    fn check_handle(&self, handle: &PageHandle) -> Result<()> {
        let state = self.state.lock();
        match state.descriptors.get(handle.frame_id.index()) {
            Some(desc) if desc.holds(handle.file_id, handle.page_id) && desc.is_pinned() => Ok(()),
            _ => Err(not_pinned(handle)),
        }
    }

    fn frame_latch(&self, handle: &PageHandle) -> Result<&RwLock<Page>> {
        self.pool
            .get(handle.frame_id.index())
            .ok_or_else(|| not_pinned(handle))
    }
}

fn not_pinned(handle: &PageHandle) -> Error {
    Error::PageNotPinned {
        file: handle.file_id.to_string(),
        page_id: handle.page_id,
        frame_id: handle.frame_id,
    }
}

/// Write a frame's bytes back to `file` as `page_id`.
///
/// The page id comes from the descriptor. If the header in the frame no
/// longer names that page it is restamped on a copy, so a write-back never
/// lands in another page's slot.
fn write_back(
    file: &FileRef,
    page_id: PageId,
    page: &Page,
    stats: &BufferPoolStats,
) -> Result<()> {
    let header = page.header();
    if header.page_id == page_id && header.page_type == PageType::Data {
        file.write_page(page)?;
    } else {
        warn!(
            file = file.filename(),
            %page_id,
            found = %header.page_id,
            "page header overwritten, restamping before write-back"
        );
        let mut restamped = Page::new();
        restamped.copy_from(page);
        restamped.set_header(&PageHeader::new(PageType::Data, page_id));
        file.write_page(&restamped)?;
    }
    stats.record_disk_write();
    Ok(())
}

fn bad_buffer(desc: &FrameDescriptor) -> Error {
    Error::BadBuffer {
        frame_id: desc.frame_id(),
        valid: desc.is_valid(),
        dirty: desc.is_dirty(),
        referenced: desc.is_referenced(),
    }
}

impl Drop for BufferPoolManager {
    /// Write back every valid dirty frame. Failures are logged, not raised.
    fn drop(&mut self) {
        let state = self.state.get_mut();

        for desc in &state.descriptors {
            if !(desc.is_valid() && desc.is_dirty()) {
                continue;
            }
            let Some(file) = desc.file() else {
                continue;
            };
            let page = self.pool[desc.frame_id().index()].get_mut();
            if let Err(e) = write_back(file, desc.page_id(), page, &self.stats) {
                warn!(
                    file = file.filename(),
                    page_id = %desc.page_id(),
                    frame_id = %desc.frame_id(),
                    error = %e,
                    "write-back at shutdown failed"
                );
            }
        }
    }
}
