use log::{debug, error};
use lru::LruCache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::{FileError, FileResult};
use super::source::FileCatalog;
use super::{DEFAULT_POOL_PAGES, PAGE_SIZE, PageId};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a logical writer, recorded on the pages it dirties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters describing pool activity since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flushes: u64,
    /// Largest number of pages ever resident at once
    pub peak_resident: usize,
}

/// Entry in the buffer pool
struct PoolEntry {
    /// The actual page data
    data: Vec<u8>,
    /// Whether the on-disk copy is stale
    dirty: bool,
    /// Last writer to dirty this page
    last_writer: Option<TransactionId>,
}

/// Bounded page cache shared by heap and index files.
///
/// Recency is tracked by the LRU list: every fetch moves the page to the
/// most-recent end, and eviction takes the page at the least-recent end,
/// clean or dirty. A dirty victim is written to its file before its slot is
/// reused, and a failed write aborts the operation that triggered it.
///
/// Page references handed out by `fetch_page`/`fetch_page_mut` borrow the
/// pool, so they cannot outlive the next call that might evict them.
pub struct BufferPool<C: FileCatalog> {
    /// Resolves a page's owning file on miss and flush
    catalog: C,
    /// Cached pages in recency order; capacity is enforced by `capacity`
    /// so the cache never drops an entry on its own
    pages: LruCache<PageId, PoolEntry>,
    /// Maximum number of resident pages
    capacity: usize,
    /// Reusable buffer for loading pages (recycled from evicted pages)
    load_buffer: Vec<u8>,
    stats: PoolStats,
}

/// Pool handle shared between a database and its streaming scans
pub type SharedPool<C> = Arc<Mutex<BufferPool<C>>>;

/// Lock a shared pool, recovering the guard if the lock is poisoned
pub fn lock_pool<C: FileCatalog>(pool: &Mutex<BufferPool<C>>) -> MutexGuard<'_, BufferPool<C>> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<C: FileCatalog> BufferPool<C> {
    /// Create a buffer pool with the default capacity
    pub fn new(catalog: C) -> Self {
        Self::with_capacity(catalog, DEFAULT_POOL_PAGES)
    }

    /// Create a buffer pool holding at most `capacity` pages (minimum 1)
    pub fn with_capacity(catalog: C, capacity: usize) -> Self {
        Self {
            catalog,
            pages: LruCache::unbounded(),
            capacity: capacity.max(1),
            load_buffer: vec![0u8; PAGE_SIZE],
            stats: PoolStats::default(),
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    /// Wrap the pool for sharing with scans
    pub fn into_shared(self) -> SharedPool<C> {
        Arc::new(Mutex::new(self))
    }

    /// Get a page for reading, loading it from its file on a miss
    pub fn fetch_page(&mut self, page: PageId) -> FileResult<&[u8]> {
        self.ensure_resident(page)?;
        self.pages
            .get(&page)
            .map(|entry| entry.data.as_slice())
            .ok_or(FileError::PageNotCached(page))
    }

    /// Get a page for writing, loading it from its file on a miss.
    /// The caller is responsible for calling `mark_dirty` after modifying it.
    pub fn fetch_page_mut(&mut self, page: PageId) -> FileResult<&mut [u8]> {
        self.ensure_resident(page)?;
        self.pages
            .get_mut(&page)
            .map(|entry| entry.data.as_mut_slice())
            .ok_or(FileError::PageNotCached(page))
    }

    /// Insert a brand-new page that does not exist on disk yet.
    /// The page is marked dirty immediately.
    pub fn insert_fresh(
        &mut self,
        page: PageId,
        data: Vec<u8>,
        writer: Option<TransactionId>,
    ) -> FileResult<()> {
        if data.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: data.len(),
            });
        }

        if let Some(entry) = self.pages.get_mut(&page) {
            entry.data = data;
            entry.dirty = true;
            entry.last_writer = writer;
            return Ok(());
        }

        while self.pages.len() >= self.capacity {
            self.evict_one()?;
        }

        debug!("inserting fresh page {}", page);
        self.pages.put(
            page,
            PoolEntry {
                data,
                dirty: true,
                last_writer: writer,
            },
        );
        self.note_resident();
        Ok(())
    }

    /// Record whether a cached page's on-disk copy is stale
    pub fn mark_dirty(
        &mut self,
        page: PageId,
        dirty: bool,
        writer: Option<TransactionId>,
    ) -> FileResult<()> {
        let entry = self
            .pages
            .peek_mut(&page)
            .ok_or(FileError::PageNotCached(page))?;

        entry.dirty = dirty;
        if dirty {
            entry.last_writer = writer;
        } else {
            entry.last_writer = None;
        }
        Ok(())
    }

    /// Write a dirty page to its file and drop it from the pool.
    /// Clean or non-resident pages are left alone.
    pub fn flush_page(&mut self, page: PageId) -> FileResult<()> {
        if self.write_if_dirty(page)? {
            self.pages.pop(&page);
            self.stats.flushes += 1;
        }
        Ok(())
    }

    /// Flush every dirty page, then sync all files
    pub fn flush_all(&mut self) -> FileResult<()> {
        // Iterate without touching recency order
        let dirty_pages: Vec<PageId> = self
            .pages
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(page, _)| *page)
            .collect();

        for page in dirty_pages {
            self.flush_page(page)?;
        }

        self.catalog.sync_all()
    }

    /// Evict the least recently fetched page, writing it first if dirty.
    /// Returns the evicted page id.
    pub fn evict_one(&mut self) -> FileResult<PageId> {
        let victim = self
            .pages
            .peek_lru()
            .map(|(page, _)| *page)
            .ok_or(FileError::PoolEmpty)?;

        let was_dirty = self.write_if_dirty(victim)?;

        if let Some(entry) = self.pages.pop(&victim) {
            // Recycle the evicted buffer for future page loads
            self.load_buffer = entry.data;
        }
        self.stats.evictions += 1;
        debug!("evicted page {} (dirty: {})", victim, was_dirty);

        Ok(victim)
    }

    /// Drop a page from the pool without writing it back
    pub fn discard_page(&mut self, page: PageId) {
        self.pages.pop(&page);
    }

    /// Check if a page is in the buffer pool
    pub fn is_cached(&self, page: PageId) -> bool {
        self.pages.contains(&page)
    }

    pub fn is_dirty(&self, page: PageId) -> bool {
        self.pages.peek(&page).is_some_and(|entry| entry.dirty)
    }

    pub fn last_writer(&self, page: PageId) -> Option<TransactionId> {
        self.pages.peek(&page).and_then(|entry| entry.last_writer)
    }

    /// Number of pages currently resident
    pub fn resident_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of dirty pages currently resident
    pub fn dirty_count(&self) -> usize {
        self.pages.iter().filter(|(_, entry)| entry.dirty).count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn ensure_resident(&mut self, page: PageId) -> FileResult<()> {
        if self.pages.contains(&page) {
            self.stats.hits += 1;
            return Ok(());
        }
        self.load_page(page)
    }

    /// Load a page from its file into the pool
    fn load_page(&mut self, page: PageId) -> FileResult<()> {
        while self.pages.len() >= self.capacity {
            self.evict_one()?;
        }

        if self.load_buffer.len() != PAGE_SIZE {
            self.load_buffer = vec![0u8; PAGE_SIZE];
        }

        self.catalog
            .db_file(page.file_id)?
            .read_page(page, &mut self.load_buffer)?;

        // Move the loaded buffer into the pool without copying
        let data = std::mem::take(&mut self.load_buffer);
        self.pages.put(
            page,
            PoolEntry {
                data,
                dirty: false,
                last_writer: None,
            },
        );
        self.stats.misses += 1;
        self.note_resident();

        Ok(())
    }

    /// Write a resident dirty page to its file. Returns whether a write happened.
    fn write_if_dirty(&mut self, page: PageId) -> FileResult<bool> {
        let Some(entry) = self.pages.peek_mut(&page) else {
            return Ok(false);
        };
        if !entry.dirty {
            return Ok(false);
        }

        self.catalog
            .db_file(page.file_id)?
            .write_page(page, &entry.data)?;
        entry.dirty = false;
        entry.last_writer = None;

        Ok(true)
    }

    fn note_resident(&mut self) {
        self.stats.peak_resident = self.stats.peak_resident.max(self.pages.len());
    }
}

impl<C: FileCatalog> Drop for BufferPool<C> {
    fn drop(&mut self) {
        if let Err(err) = self.flush_all() {
            error!("failed to flush buffer pool on drop: {}", err);
        }
    }
}
