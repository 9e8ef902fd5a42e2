//! Disk file - pages stored in a single file on disk.
//!
//! [`DiskFile`] is the on-disk [`PageFile`]:
//! - Reading and writing pages, with checksum verification
//! - Allocating new pages, reusing deleted slots first
//! - Deleting pages by marking their slot free

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, FileId, PageId, Result};
use crate::storage::file::PageFile;
use crate::storage::page::{Page, PageHeader, PageType};

/// A page file backed by one file on disk.
///
/// # File Layout
/// Pages are laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// A deleted page keeps its slot; its header is rewritten with
/// [`PageType::Free`] and the slot is handed out again by the next
/// allocation. The free list is rebuilt from the headers on [`DiskFile::open`].
///
/// # Durability
/// All writes are followed by `fsync()`.
pub struct DiskFile {
    id: FileId,
    filename: String,
    inner: Mutex<DiskFileInner>,
}

struct DiskFileInner {
    file: File,
    /// Number of page slots in the file, live or free.
    page_count: u32,
    /// Deleted slots, reused LIFO.
    free_pages: Vec<PageId>,
}

impl DiskFile {
    /// Create a new page file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        Ok(Self::from_parts(path.as_ref(), file, 0, Vec::new()))
    }

    /// Open an existing page file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        // Rebuild the free list from the slot headers
        let mut free_pages = Vec::new();
        let mut header = [0u8; PageHeader::SIZE];
        for pid in 0..page_count {
            let page_id = PageId::new(pid);
            file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
            file.read_exact(&mut header)?;
            if PageHeader::from_bytes(&header).page_type != PageType::Data {
                free_pages.push(page_id);
            }
        }

        Ok(Self::from_parts(path.as_ref(), file, page_count, free_pages))
    }

    /// Open an existing page file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn from_parts(path: &Path, file: File, page_count: u32, free_pages: Vec<PageId>) -> Self {
        Self {
            id: FileId::next(),
            filename: path.display().to_string(),
            inner: Mutex::new(DiskFileInner {
                file,
                page_count,
                free_pages,
            }),
        }
    }

    /// Number of page slots in the file, including deleted ones.
    pub fn page_count(&self) -> u32 {
        self.inner.lock().page_count
    }

    /// Number of deleted slots waiting for reuse.
    pub fn free_page_count(&self) -> usize {
        self.inner.lock().free_pages.len()
    }
}

impl DiskFileInner {
    fn check_live(&self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.page_count || self.free_pages.contains(&page_id) {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }

    fn write_slot(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
        self.file.write_all(data)?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl PageFile for DiskFile {
    fn file_id(&self) -> FileId {
        self.id
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    /// # Errors
    /// - `Error::PageNotFound` if the slot doesn't exist or was deleted
    /// - `Error::ChecksumMismatch` if the stored content is corrupt
    fn read_page(&self, page_id: PageId) -> Result<Page> {
        let mut inner = self.inner.lock();
        inner.check_live(page_id)?;

        inner.file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
        let mut page = Page::new();
        inner.file.read_exact(page.as_mut_slice())?;

        if !page.verify_checksum() {
            return Err(Error::ChecksumMismatch(page_id));
        }
        Ok(page)
    }

    /// # Errors
    /// Returns `Error::PageNotFound` if the page's slot isn't live.
    fn write_page(&self, page: &Page) -> Result<()> {
        let page_id = page.page_id();
        let mut inner = self.inner.lock();
        inner.check_live(page_id)?;

        let mut data = [0u8; PAGE_SIZE];
        data.copy_from_slice(page.as_slice());
        PageHeader::stamp_checksum(&mut data);

        inner.write_slot(page_id, &data)
    }

    fn allocate_page(&self) -> Result<Page> {
        let mut inner = self.inner.lock();

        let (page_id, reused) = match inner.free_pages.pop() {
            Some(page_id) => (page_id, true),
            None => (PageId::new(inner.page_count), false),
        };

        let mut page = Page::for_id(page_id);
        page.update_checksum();

        if let Err(e) = inner.write_slot(page_id, page.as_slice()) {
            if reused {
                inner.free_pages.push(page_id);
            }
            return Err(e);
        }
        if !reused {
            inner.page_count += 1;
        }

        debug!(file = %self.filename, %page_id, reused, "allocated page");
        Ok(page)
    }

    /// # Errors
    /// Returns `Error::PageNotFound` if the slot doesn't exist or was already deleted.
    fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_live(page_id)?;

        let mut data = [0u8; PAGE_SIZE];
        PageHeader::new(PageType::Free, page_id).write_to(&mut data);
        PageHeader::stamp_checksum(&mut data);
        inner.write_slot(page_id, &data)?;

        inner.free_pages.push(page_id);
        debug!(file = %self.filename, %page_id, "deleted page");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let file = DiskFile::create(&path).unwrap();
        assert_eq!(file.page_count(), 0);
        assert!(file.filename().ends_with("test.db"));
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskFile::create(&path).unwrap();
        assert!(DiskFile::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(DiskFile::open(dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_allocate_and_read_page() {
        let dir = tempdir().unwrap();
        let file = DiskFile::create(dir.path().join("test.db")).unwrap();

        let page = file.allocate_page().unwrap();
        assert_eq!(page.page_id(), PageId::new(0));
        assert_eq!(file.page_count(), 1);

        let read = file.read_page(PageId::new(0)).unwrap();
        assert_eq!(read.page_id(), PageId::new(0));
        assert!(read.payload().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let file = DiskFile::create(dir.path().join("test.db")).unwrap();

        let mut page = file.allocate_page().unwrap();
        page.payload_mut()[0] = 0xAB;
        page.payload_mut()[Page::PAYLOAD_SIZE - 1] = 0xEF;
        file.write_page(&page).unwrap();

        let read = file.read_page(page.page_id()).unwrap();
        assert_eq!(read.payload()[0], 0xAB);
        assert_eq!(read.payload()[Page::PAYLOAD_SIZE - 1], 0xEF);
    }

    #[test]
    fn test_write_unallocated_page_fails() {
        let dir = tempdir().unwrap();
        let file = DiskFile::create(dir.path().join("test.db")).unwrap();

        let page = Page::for_id(PageId::new(0));
        assert!(matches!(file.write_page(&page), Err(Error::PageNotFound(_))));
    }

    #[test]
    fn test_delete_and_reuse() {
        let dir = tempdir().unwrap();
        let file = DiskFile::create(dir.path().join("test.db")).unwrap();

        let p0 = file.allocate_page().unwrap().page_id();
        let p1 = file.allocate_page().unwrap().page_id();

        file.delete_page(p0).unwrap();
        assert!(matches!(file.read_page(p0), Err(Error::PageNotFound(_))));
        assert!(matches!(file.delete_page(p0), Err(Error::PageNotFound(_))));
        assert!(file.read_page(p1).is_ok());

        // The freed slot comes back before the file grows
        let reused = file.allocate_page().unwrap();
        assert_eq!(reused.page_id(), p0);
        assert_eq!(file.page_count(), 2);
    }

    #[test]
    fn test_persistence_and_free_list_rebuild() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let file = DiskFile::create(&path).unwrap();
            let mut page = file.allocate_page().unwrap();
            page.payload_mut()[0] = 0x42;
            file.write_page(&page).unwrap();

            let doomed = file.allocate_page().unwrap().page_id();
            file.delete_page(doomed).unwrap();
        }

        let file = DiskFile::open(&path).unwrap();
        assert_eq!(file.page_count(), 2);
        assert_eq!(file.free_page_count(), 1);
        assert_eq!(file.read_page(PageId::new(0)).unwrap().payload()[0], 0x42);
        assert!(file.read_page(PageId::new(1)).is_err());
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let file = DiskFile::create(&path).unwrap();
            file.allocate_page().unwrap();
        }

        // Flip a payload byte behind the file's back
        {
            let mut raw = OpenOptions::new().write(true).open(&path).unwrap();
            raw.seek(SeekFrom::Start(100)).unwrap();
            raw.write_all(&[0xFF]).unwrap();
        }

        let file = DiskFile::open(&path).unwrap();
        assert!(matches!(
            file.read_page(PageId::new(0)),
            Err(Error::ChecksumMismatch(_))
        ));
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let file = DiskFile::open_or_create(&path).unwrap();
            assert_eq!(file.page_count(), 0);
            file.allocate_page().unwrap();
        }

        let file = DiskFile::open_or_create(&path).unwrap();
        assert_eq!(file.page_count(), 1);
    }

    #[test]
    fn test_handles_get_distinct_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let a = DiskFile::create(&path).unwrap();
        let b = DiskFile::open(&path).unwrap();
        assert_ne!(a.file_id(), b.file_id());
    }
}
