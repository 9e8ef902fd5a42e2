//! In-memory page file.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{Error, FileId, PageId, Result};
use crate::storage::file::PageFile;
use crate::storage::page::Page;

/// A page file that keeps its pages in memory.
///
/// Behaves like [`DiskFile`](crate::storage::DiskFile) (same id assignment,
/// same slot reuse, same errors) but counts every read and write, so callers
/// can observe exactly when the buffer pool goes to "disk".
pub struct MemFile {
    id: FileId,
    filename: String,
    inner: Mutex<MemFileInner>,
    reads: AtomicU64,
    writes: AtomicU64,
}

#[derive(Default)]
struct MemFileInner {
    /// Slot contents; `None` marks a deleted slot.
    pages: Vec<Option<Box<Page>>>,
    free_pages: Vec<PageId>,
}

impl MemFile {
    /// Create an empty in-memory file.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            id: FileId::next(),
            filename: filename.into(),
            inner: Mutex::new(MemFileInner::default()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of `read_page` calls that returned a page.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `write_page` calls that stored a page.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Whether `page_id` is allocated and not deleted.
    pub fn contains_page(&self, page_id: PageId) -> bool {
        let inner = self.inner.lock();
        matches!(inner.pages.get(page_id.0 as usize), Some(Some(_)))
    }

    /// Number of live pages.
    pub fn live_page_count(&self) -> usize {
        self.inner.lock().pages.iter().flatten().count()
    }

    /// Copy of the stored content of `page_id`, without counting a read.
    pub fn stored_page(&self, page_id: PageId) -> Option<Page> {
        let inner = self.inner.lock();
        let stored = inner.pages.get(page_id.0 as usize)?.as_ref()?;
        let mut page = Page::new();
        page.copy_from(stored);
        Some(page)
    }
}

impl MemFileInner {
    fn slot_mut(&mut self, page_id: PageId) -> Result<&mut Page> {
        self.pages
            .get_mut(page_id.0 as usize)
            .and_then(|slot| slot.as_deref_mut())
            .ok_or(Error::PageNotFound(page_id))
    }
}

impl PageFile for MemFile {
    fn file_id(&self) -> FileId {
        self.id
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        let mut inner = self.inner.lock();
        let stored = inner.slot_mut(page_id)?;

        let mut page = Page::new();
        page.copy_from(stored);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(page)
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.slot_mut(page.page_id())?.copy_from(page);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn allocate_page(&self) -> Result<Page> {
        let mut inner = self.inner.lock();

        let page_id = match inner.free_pages.pop() {
            Some(page_id) => page_id,
            None => {
                inner.pages.push(None);
                PageId::new((inner.pages.len() - 1) as u32)
            }
        };
        inner.pages[page_id.0 as usize] = Some(Box::new(Page::for_id(page_id)));

        Ok(Page::for_id(page_id))
    }

    fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.slot_mut(page_id)?;
        inner.pages[page_id.0 as usize] = None;
        inner.free_pages.push(page_id);
        Ok(())
    }
}
