//! Page - the fixed-size unit of caching and I/O.
//!
//! A [`Page`] is a raw 4KB byte array. The first [`PageHeader::SIZE`] bytes
//! hold the header; the rest is the payload owned by whoever uses the page.

use crate::common::config::PAGE_SIZE;
use crate::common::PageId;

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// # Clone
/// `Page` does not implement `Clone`: copying 4KB should be explicit, so use
/// [`Page::copy_from`].
///
/// # Example
/// ```
/// use clockpool::{Page, PageId};
///
/// let mut page = Page::for_id(PageId::new(3));
/// page.payload_mut()[0] = 0xFF;
/// assert_eq!(page.page_id(), PageId::new(3));
/// assert_eq!(page.payload()[0], 0xFF);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Size of the caller-owned area after the header.
    pub const PAYLOAD_SIZE: usize = PAGE_SIZE - PageHeader::SIZE;

    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Create a zeroed data page stamped with `page_id`.
    pub fn for_id(page_id: PageId) -> Self {
        let mut page = Self::new();
        page.set_header(&PageHeader::new(PageType::Data, page_id));
        page
    }

    /// Whole page, header included.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Whole page, header included.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes after the header.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[PageHeader::SIZE..]
    }

    /// Bytes after the header.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.data[PageHeader::SIZE..]
    }

    /// Id of the page this content belongs to, read from the header.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.header().page_id
    }

    /// Overwrite this page with the bytes of `other`.
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Write a page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Compute and store checksum in the header.
    pub fn update_checksum(&mut self) {
        PageHeader::stamp_checksum(&mut self.data);
    }

    /// Verify the page checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
