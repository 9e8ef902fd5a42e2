//! File identity type.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_FILE_ID: AtomicU32 = AtomicU32::new(0);

/// Identifies one open file collaborator.
///
/// Every [`PageFile`](crate::storage::PageFile) gets a fresh id when it is
/// opened, so two handles on the same path are still distinct files as far
/// as the page directory is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// Hand out a process-unique id.
    pub fn next() -> Self {
        FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ids_are_unique() {
        let a = FileId::next();
        let b = FileId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_id_display() {
        assert_eq!(format!("{}", FileId(3)), "File(3)");
    }
}
