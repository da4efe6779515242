use std::io;
use thiserror::Error;

use super::page_id::{FileId, PageCategory, PageId};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("No storage file registered for id {0}")]
    UnknownFile(FileId),

    #[error("Page {page} is past the end of file ({page_count} pages)")]
    PageOutOfRange { page: PageId, page_count: usize },

    #[error("Page {page} has category {found:?}, file expects {expected}")]
    WrongCategory {
        page: PageId,
        found: PageCategory,
        expected: &'static str,
    },

    #[error("Page not in buffer pool: {0}")]
    PageNotCached(PageId),

    #[error("Cannot evict: buffer pool is empty")]
    PoolEmpty,

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },
}

pub type FileResult<T> = Result<T, FileError>;
