use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;

use super::error::{RecordError, RecordResult};
use super::iterator::DbFileIterator;
use super::page::HeapPage;
use super::schema::TupleDesc;
use super::tuple::{RecordId, Tuple};
use crate::file::{
    BufferPool, FileCatalog, FileId, PageCategory, PageId, SharedPool, TransactionId, lock_pool,
};

/// Unordered table stored as a run of heap pages.
///
/// Holds only metadata; page bytes always go through the buffer pool passed
/// into each call.
#[derive(Debug, Clone)]
pub struct HeapFile {
    id: FileId,
    desc: Arc<TupleDesc>,
    num_pages: usize,
}

impl HeapFile {
    /// Handle for a heap file with no pages yet
    pub fn new(id: FileId, desc: Arc<TupleDesc>) -> Self {
        Self {
            id,
            desc,
            num_pages: 0,
        }
    }

    /// Open an existing heap file, taking its page count from disk
    pub fn open<C: FileCatalog>(
        pool: &mut BufferPool<C>,
        id: FileId,
        desc: Arc<TupleDesc>,
    ) -> RecordResult<Self> {
        HeapPage::layout(&desc)?;
        let num_pages = pool.catalog_mut().db_file(id)?.page_count()?;
        Ok(Self {
            id,
            desc,
            num_pages,
        })
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Logical page count, including fresh pages not yet flushed
    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    pub fn page_id(&self, page_no: usize) -> PageId {
        PageId::heap(self.id, page_no)
    }

    /// Insert a tuple into the first page with a free slot, appending a new
    /// page when every page is full. Sets the tuple's record id and returns
    /// the pages dirtied.
    pub fn add_tuple<C: FileCatalog>(
        &mut self,
        pool: &mut BufferPool<C>,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> RecordResult<Vec<PageId>> {
        self.check_desc(tuple)?;

        for page_no in 0..self.num_pages {
            let page_id = self.page_id(page_no);
            let rid = {
                let data = pool.fetch_page_mut(page_id)?;
                let mut page = HeapPage::new(page_id, self.desc.clone(), data)?;
                if !page.has_free_slot() {
                    continue;
                }
                page.insert_tuple(tuple)?
            };
            pool.mark_dirty(page_id, true, Some(tid))?;
            tuple.set_record_id(Some(rid));
            return Ok(vec![page_id]);
        }

        let page_id = self.page_id(self.num_pages);
        let mut data = HeapPage::empty_page_data();
        let rid = HeapPage::new(page_id, self.desc.clone(), &mut data[..])?.insert_tuple(tuple)?;
        pool.insert_fresh(page_id, data, Some(tid))?;
        self.num_pages += 1;
        debug!("heap file {} grew to {} pages", self.id, self.num_pages);

        tuple.set_record_id(Some(rid));
        Ok(vec![page_id])
    }

    /// Free the slot holding `tuple`. Returns the pages dirtied.
    pub fn delete_tuple<C: FileCatalog>(
        &mut self,
        pool: &mut BufferPool<C>,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> RecordResult<Vec<PageId>> {
        let rid = tuple.record_id().ok_or(RecordError::MissingRecordId)?;
        self.check_rid(rid)?;

        let data = pool.fetch_page_mut(rid.page_id)?;
        let result = HeapPage::new(rid.page_id, self.desc.clone(), data)?.delete_tuple(rid.slot);
        if let Err(err) = result {
            warn!("delete missed in heap file {}: {}", self.id, err);
            return Err(err);
        }
        pool.mark_dirty(rid.page_id, true, Some(tid))?;
        Ok(vec![rid.page_id])
    }

    /// Read the tuple stored at `rid`
    pub fn read_tuple<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        rid: RecordId,
    ) -> RecordResult<Tuple> {
        self.check_rid(rid)?;
        let data = pool.fetch_page(rid.page_id)?;
        HeapPage::new(rid.page_id, self.desc.clone(), data)?.tuple(rid.slot)
    }

    /// Every tuple on one page, in slot order
    pub fn page_tuples<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        page_no: usize,
    ) -> RecordResult<Vec<Tuple>> {
        let page_id = self.page_id(page_no);
        let data = pool.fetch_page(page_id)?;
        HeapPage::new(page_id, self.desc.clone(), data)?.tuples()
    }

    /// Lazy scan over every tuple in page then slot order
    pub fn scan<C: FileCatalog>(&self, pool: SharedPool<C>) -> HeapScan<C> {
        HeapScan::new(self.clone(), pool)
    }

    fn check_desc(&self, tuple: &Tuple) -> RecordResult<()> {
        if **tuple.desc() != *self.desc {
            return Err(RecordError::DescMismatch {
                expected: self.desc.to_string(),
                actual: tuple.desc().to_string(),
            });
        }
        Ok(())
    }

    fn check_rid(&self, rid: RecordId) -> RecordResult<()> {
        if rid.page_id.file_id != self.id {
            return Err(RecordError::WrongTable {
                expected: self.id,
                found: rid.page_id.file_id,
            });
        }
        if rid.page_id.category != PageCategory::Heap || rid.page_id.page_no >= self.num_pages {
            return Err(RecordError::TupleNotFound {
                page: rid.page_id,
                slot: rid.slot,
            });
        }
        Ok(())
    }
}

/// Streaming heap scan: loads one page at a time through the shared pool.
///
/// The page count is captured when the scan is created.
pub struct HeapScan<C: FileCatalog> {
    file: HeapFile,
    pool: SharedPool<C>,
    next_page: usize,
    pending: VecDeque<Tuple>,
    open: bool,
}

impl<C: FileCatalog> HeapScan<C> {
    fn new(file: HeapFile, pool: SharedPool<C>) -> Self {
        Self {
            file,
            pool,
            next_page: 0,
            pending: VecDeque::new(),
            open: false,
        }
    }

    /// Load pages until a tuple is pending or the file is exhausted
    fn fill(&mut self) -> RecordResult<()> {
        while self.pending.is_empty() && self.next_page < self.file.num_pages() {
            let mut pool = lock_pool(&self.pool);
            let tuples = self.file.page_tuples(&mut pool, self.next_page)?;
            self.pending.extend(tuples);
            self.next_page += 1;
        }
        Ok(())
    }
}

impl<C: FileCatalog> DbFileIterator for HeapScan<C> {
    fn open(&mut self) -> RecordResult<()> {
        self.next_page = 0;
        self.pending.clear();
        self.open = true;
        Ok(())
    }

    fn has_next(&mut self) -> RecordResult<bool> {
        if !self.open {
            return Err(RecordError::IteratorClosed);
        }
        self.fill()?;
        Ok(!self.pending.is_empty())
    }

    fn next(&mut self) -> RecordResult<Tuple> {
        if !self.has_next()? {
            return Err(RecordError::NoMoreTuples);
        }
        self.pending.pop_front().ok_or(RecordError::NoMoreTuples)
    }

    fn close(&mut self) {
        self.open = false;
        self.pending.clear();
    }
}
