//! Page-source abstraction the buffer pool fills misses from and flushes to.

use super::error::FileResult;
use super::page_id::{FileId, PageId};

/// A storage file the buffer pool can read pages from and write pages to.
pub trait DbFile {
    /// Identifier this file is registered under
    fn id(&self) -> FileId;

    /// Read page `page` into `buffer` (exactly `PAGE_SIZE` bytes)
    fn read_page(&mut self, page: PageId, buffer: &mut [u8]) -> FileResult<()>;

    /// Persist `data` as page `page`
    fn write_page(&mut self, page: PageId, data: &[u8]) -> FileResult<()>;

    /// Number of pages currently on disk
    fn page_count(&self) -> FileResult<usize>;

    fn sync(&mut self) -> FileResult<()>;
}

/// Resolves the file that owns a page.
///
/// Handed to the buffer pool at construction; the pool never reaches for
/// global state to find a file.
pub trait FileCatalog {
    fn db_file(&mut self, id: FileId) -> FileResult<&mut dyn DbFile>;

    /// Sync every registered file
    fn sync_all(&mut self) -> FileResult<()>;
}
