//! Page identifiers shared by heap and index files.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::PAGE_SIZE;

/// Page number within a single file
pub type PageNo = usize;

/// Identifier of a storage file registered in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of page a [`PageId`] refers to.
///
/// Heap files only hold `Heap` pages. Index files hold a fixed run of
/// `Bucket` pages followed by `Overflow` pages appended on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageCategory {
    Heap,
    Bucket,
    Overflow,
}

impl PageCategory {
    pub fn is_index(&self) -> bool {
        matches!(self, PageCategory::Bucket | PageCategory::Overflow)
    }
}

/// Unique identifier for a page: owning file, page number and category.
///
/// Two ids are equal only when all three components match, so a bucket page
/// and an overflow page with the same number never alias in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub file_id: FileId,
    pub page_no: PageNo,
    pub category: PageCategory,
}

impl PageId {
    pub const fn new(file_id: FileId, page_no: PageNo, category: PageCategory) -> Self {
        Self {
            file_id,
            page_no,
            category,
        }
    }

    pub const fn heap(file_id: FileId, page_no: PageNo) -> Self {
        Self::new(file_id, page_no, PageCategory::Heap)
    }

    pub const fn bucket(file_id: FileId, page_no: PageNo) -> Self {
        Self::new(file_id, page_no, PageCategory::Bucket)
    }

    pub const fn overflow(file_id: FileId, page_no: PageNo) -> Self {
        Self::new(file_id, page_no, PageCategory::Overflow)
    }

    /// Byte offset of this page within its file
    pub const fn offset(&self) -> u64 {
        (self.page_no as u64) * (PAGE_SIZE as u64)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.category {
            PageCategory::Heap => "heap",
            PageCategory::Bucket => "bucket",
            PageCategory::Overflow => "overflow",
        };
        write!(f, "{}:{}/{}", tag, self.file_id, self.page_no)
    }
}
