//! Static hash index file

use log::{debug, info, warn};
use std::sync::Arc;

use crate::file::{BufferPool, FileCatalog, FileId, PageId, TransactionId};
use crate::record::{Field, RecordError, RecordId, Tuple, TupleDesc, TupleListIter, Type};

use super::error::{IndexError, IndexResult};
use super::hash::HashScheme;
use super::page::IndexPage;
use super::predicate::AccessPredicate;

/// Secondary hash index on one field of a heap table.
///
/// Pages `0..bucket_count` are primary buckets; overflow pages are appended
/// after them from a per-index counter and never reused. Entries are
/// `(key, page, slot)` tuples pointing back into the base table.
#[derive(Debug, Clone)]
pub struct IndexFile {
    id: FileId,
    table_id: FileId,
    key_field: usize,
    entry_desc: Arc<TupleDesc>,
    bucket_count: usize,
    scheme: HashScheme,
    /// Page number the next overflow page will get
    next_page: usize,
}

impl IndexFile {
    /// Create an empty index, inserting every bucket page into the pool as
    /// a fresh page
    pub fn create<C: FileCatalog>(
        pool: &mut BufferPool<C>,
        tid: TransactionId,
        id: FileId,
        table_id: FileId,
        key_field: usize,
        key_type: Type,
        bucket_count: usize,
    ) -> IndexResult<Self> {
        let index = Self::new(id, table_id, key_field, key_type, bucket_count)?;

        for bucket in 0..index.bucket_count {
            pool.insert_fresh(
                PageId::bucket(id, bucket),
                IndexPage::empty_page_data(),
                Some(tid),
            )?;
        }
        info!(
            "created hash index {} on field {} of {} with {} buckets",
            id, key_field, table_id, index.bucket_count
        );

        Ok(index)
    }

    /// Open an existing index, resuming overflow allocation after the last
    /// page on disk
    pub fn open<C: FileCatalog>(
        pool: &mut BufferPool<C>,
        id: FileId,
        table_id: FileId,
        key_field: usize,
        key_type: Type,
        bucket_count: usize,
    ) -> IndexResult<Self> {
        let mut index = Self::new(id, table_id, key_field, key_type, bucket_count)?;
        let page_count = pool.catalog_mut().db_file(id)?.page_count()?;
        index.next_page = page_count.max(index.bucket_count);
        Ok(index)
    }

    fn new(
        id: FileId,
        table_id: FileId,
        key_field: usize,
        key_type: Type,
        bucket_count: usize,
    ) -> IndexResult<Self> {
        let bucket_count = bucket_count.max(1);
        let entry_desc = Arc::new(TupleDesc::index_entry(key_type));
        IndexPage::layout(&entry_desc)?;
        Ok(Self {
            id,
            table_id,
            key_field,
            entry_desc,
            bucket_count,
            scheme: HashScheme::for_buckets(bucket_count),
            next_page: bucket_count,
        })
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    /// Heap file this index points into
    pub fn table_id(&self) -> FileId {
        self.table_id
    }

    pub fn key_field(&self) -> usize {
        self.key_field
    }

    pub fn key_type(&self) -> Type {
        self.entry_desc.fields()[0].field_type
    }

    pub fn entry_desc(&self) -> &Arc<TupleDesc> {
        &self.entry_desc
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Pages allocated so far, buckets included
    pub fn num_pages(&self) -> usize {
        self.next_page
    }

    pub fn bucket_of(&self, key: &Field) -> usize {
        self.scheme.bucket(key, self.bucket_count)
    }

    /// Build the index entry for a base-table tuple
    pub fn create_entry(&self, tuple: &Tuple) -> IndexResult<Tuple> {
        let num_fields = tuple.fields().len();
        let key = tuple
            .fields()
            .get(self.key_field)
            .ok_or(IndexError::InvalidKeyField {
                field: self.key_field,
                num_fields,
            })?;
        let rid = tuple.record_id().ok_or(RecordError::MissingRecordId)?;
        if rid.page_id.file_id != self.table_id {
            return Err(RecordError::WrongTable {
                expected: self.table_id,
                found: rid.page_id.file_id,
            }
            .into());
        }

        let entry = Tuple::new(
            self.entry_desc.clone(),
            vec![
                key.clone(),
                Field::Int(rid.page_id.page_no as i32),
                Field::Int(rid.slot as i32),
            ],
        )?;
        Ok(entry)
    }

    /// Map an index entry back to the base-table tuple it describes
    pub fn rid_from_entry(&self, entry: &Tuple) -> IndexResult<RecordId> {
        let page_no = entry_int(entry, 1)?;
        let slot = entry_int(entry, 2)?;
        Ok(RecordId::new(PageId::heap(self.table_id, page_no), slot))
    }

    /// Add the entry for `tuple`, walking its bucket chain to the first page
    /// with room and appending an overflow page if the whole chain is full.
    /// Returns the pages dirtied.
    pub fn add_tuple<C: FileCatalog>(
        &mut self,
        pool: &mut BufferPool<C>,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> IndexResult<Vec<PageId>> {
        let entry = self.create_entry(tuple)?;
        let bucket = self.bucket_of(entry.field(0)?);
        let mut page_id = PageId::bucket(self.id, bucket);
        let mut dirtied = Vec::new();

        loop {
            let (inserted, next) = {
                let data = pool.fetch_page_mut(page_id)?;
                let mut page = IndexPage::new(page_id, self.entry_desc.clone(), data)?;
                if page.has_free_slot() {
                    page.insert_entry(&entry)?;
                    (true, None)
                } else {
                    (false, page.next_overflow(self.bucket_count))
                }
            };

            if inserted {
                pool.mark_dirty(page_id, true, Some(tid))?;
                dirtied.push(page_id);
                return Ok(dirtied);
            }

            page_id = match next {
                Some(page_no) => PageId::overflow(self.id, page_no),
                None => {
                    let overflow = self.append_overflow(pool, tid, page_id)?;
                    dirtied.push(page_id);
                    debug!("bucket {} of index {} overflowed into {}", bucket, self.id, overflow);
                    overflow
                }
            };
        }
    }

    /// Remove the entry for `tuple` from its bucket chain. Returns the page
    /// dirtied.
    pub fn delete_tuple<C: FileCatalog>(
        &mut self,
        pool: &mut BufferPool<C>,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> IndexResult<Vec<PageId>> {
        let entry = self.create_entry(tuple)?;
        let bucket = self.bucket_of(entry.field(0)?);
        let mut page_id = PageId::bucket(self.id, bucket);

        loop {
            let (deleted, next) = {
                let data = pool.fetch_page_mut(page_id)?;
                let mut page = IndexPage::new(page_id, self.entry_desc.clone(), data)?;
                let deleted = page.delete_entry(&entry)?;
                (deleted, page.next_overflow(self.bucket_count))
            };

            if deleted {
                pool.mark_dirty(page_id, true, Some(tid))?;
                return Ok(vec![page_id]);
            }

            match next {
                Some(page_no) => page_id = PageId::overflow(self.id, page_no),
                None => {
                    let key = entry.field(0)?.to_string();
                    warn!("index {} has no entry for key {}", self.id, key);
                    return Err(IndexError::EntryNotFound { key, bucket });
                }
            }
        }
    }

    /// Page of the bucket chain holding the entry for `tuple`
    pub fn locate_tuple<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        tuple: &Tuple,
    ) -> IndexResult<PageId> {
        let entry = self.create_entry(tuple)?;
        let key = entry.field(0)?;
        let bucket = self.bucket_of(key);
        let mut found = None;
        self.walk_chain(pool, bucket, |page| {
            if found.is_none() && page.find_entry(&entry)?.is_some() {
                found = Some(page.page_id());
            }
            Ok(())
        })?;
        found.ok_or_else(|| IndexError::EntryNotFound {
            key: key.to_string(),
            bucket,
        })
    }

    /// Record ids of base tuples whose key satisfies `pred`. Equality reads
    /// one bucket chain; every other operator reads all of them.
    pub fn search<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        pred: &AccessPredicate,
    ) -> IndexResult<Vec<RecordId>> {
        self.matching_entries(pool, pred)?
            .iter()
            .map(|entry| self.rid_from_entry(entry))
            .collect()
    }

    /// Matching index entries themselves, as a restartable iterator
    pub fn filter_scan<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        pred: &AccessPredicate,
    ) -> IndexResult<TupleListIter> {
        Ok(TupleListIter::new(self.matching_entries(pool, pred)?))
    }

    /// Every stored entry, in bucket then chain order
    pub fn iterator<C: FileCatalog>(&self, pool: &mut BufferPool<C>) -> IndexResult<TupleListIter> {
        let mut entries = Vec::new();
        for bucket in 0..self.bucket_count {
            entries.extend(self.chain_entries(pool, bucket)?);
        }
        Ok(TupleListIter::new(entries))
    }

    /// Number of entries stored in a bucket's whole chain
    pub fn entry_count_in_bucket<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        bucket: usize,
    ) -> IndexResult<usize> {
        let mut count = 0;
        self.walk_chain(pool, bucket, |page| {
            count += page.entry_count();
            Ok(())
        })?;
        Ok(count)
    }

    /// Number of pages in a bucket's chain, the bucket page included
    pub fn chain_len<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        bucket: usize,
    ) -> IndexResult<usize> {
        let mut pages = 0;
        self.walk_chain(pool, bucket, |_| {
            pages += 1;
            Ok(())
        })?;
        Ok(pages)
    }

    fn matching_entries<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        pred: &AccessPredicate,
    ) -> IndexResult<Vec<Tuple>> {
        let operand_type = pred.operand().field_type();
        if operand_type != self.key_type() {
            return Err(RecordError::TypeMismatch {
                expected: self.key_type(),
                actual: operand_type,
            }
            .into());
        }

        let buckets = if pred.is_point_lookup() {
            let bucket = self.bucket_of(pred.operand());
            bucket..bucket + 1
        } else {
            0..self.bucket_count
        };

        let mut matches = Vec::new();
        for bucket in buckets {
            for entry in self.chain_entries(pool, bucket)? {
                if pred.filter(&entry, 0)? {
                    matches.push(entry);
                }
            }
        }
        Ok(matches)
    }

    fn chain_entries<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        bucket: usize,
    ) -> IndexResult<Vec<Tuple>> {
        let mut entries = Vec::new();
        self.walk_chain(pool, bucket, |page| {
            entries.extend(page.entries()?);
            Ok(())
        })?;
        Ok(entries)
    }

    /// Visit every page of a bucket chain, bucket page first
    fn walk_chain<C, F>(&self, pool: &mut BufferPool<C>, bucket: usize, mut visit: F) -> IndexResult<()>
    where
        C: FileCatalog,
        F: FnMut(&IndexPage<&[u8]>) -> IndexResult<()>,
    {
        if bucket >= self.bucket_count {
            return Err(IndexError::BucketOutOfRange {
                bucket,
                bucket_count: self.bucket_count,
            });
        }

        let mut page_id = PageId::bucket(self.id, bucket);
        loop {
            let data = pool.fetch_page(page_id)?;
            let page = IndexPage::new(page_id, self.entry_desc.clone(), data)?;
            visit(&page)?;
            match page.next_overflow(self.bucket_count) {
                Some(page_no) => page_id = PageId::overflow(self.id, page_no),
                None => return Ok(()),
            }
        }
    }

    /// Put a fresh overflow page in the pool and link it from `tail`. The
    /// page number is only consumed once the link is written.
    fn append_overflow<C: FileCatalog>(
        &mut self,
        pool: &mut BufferPool<C>,
        tid: TransactionId,
        tail: PageId,
    ) -> IndexResult<PageId> {
        let page_no = self.next_page;
        let overflow = PageId::overflow(self.id, page_no);
        pool.insert_fresh(overflow, IndexPage::empty_page_data(), Some(tid))?;

        if let Err(err) = self.link_overflow(pool, tid, tail, page_no) {
            pool.discard_page(overflow);
            return Err(err);
        }
        self.next_page += 1;
        Ok(overflow)
    }

    fn link_overflow<C: FileCatalog>(
        &self,
        pool: &mut BufferPool<C>,
        tid: TransactionId,
        tail: PageId,
        page_no: usize,
    ) -> IndexResult<()> {
        let data = pool.fetch_page_mut(tail)?;
        IndexPage::new(tail, self.entry_desc.clone(), data)?.set_overflow_link(page_no as i32);
        pool.mark_dirty(tail, true, Some(tid))?;
        Ok(())
    }
}

fn entry_int(entry: &Tuple, index: usize) -> IndexResult<usize> {
    match entry.field(index)? {
        Field::Int(v) if *v >= 0 => Ok(*v as usize),
        other => Err(RecordError::Deserialization(format!(
            "index entry field {} holds {}, expected a non-negative int",
            index, other
        ))
        .into()),
    }
}
