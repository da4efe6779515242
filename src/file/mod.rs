mod buffer_pool;
mod error;
mod page_id;
mod paged_file;
mod source;

pub use buffer_pool::{BufferPool, PoolStats, SharedPool, TransactionId, lock_pool};
pub use error::{FileError, FileResult};
pub use page_id::{FileId, PageCategory, PageId, PageNo};
pub use paged_file::PagedFile;
pub use source::{DbFile, FileCatalog};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages held by the buffer pool
/// 50 pages × 4KB = 200KB of cached page data
pub const DEFAULT_POOL_PAGES: usize = 50;
