use ahash::AHashMap;
use csv::ReaderBuilder;
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError, IndexDef};
use crate::file::{
    BufferPool, FileId, PageId, PoolStats, SharedPool, TransactionId, lock_pool,
};
use crate::index::{AccessPredicate, IndexError, IndexFile};
use crate::record::{
    DbFileIterator, Field, HeapFile, HeapScan, RecordId, Tuple, TupleDesc, TupleListIter,
};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database already exists in {0}")]
    DatabaseExists(String),

    #[error("No database found in {0}")]
    DatabaseNotFound(String),

    #[error("Index {0} not found")]
    IndexNotFound(String),

    #[error("Cannot read/write file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    #[error("Record error: {0}")]
    RecordError(#[from] crate::record::RecordError),

    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),

    #[error("File error: {0}")]
    FileError(#[from] crate::file::FileError),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Shape of one bucket chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketStats {
    pub bucket: usize,
    pub entries: usize,
    pub pages: usize,
}

/// A data directory of heap tables and hash indexes sharing one buffer pool.
///
/// Inserts and deletes go to the base table and every index on it, so the
/// indexes always describe the current rows.
pub struct Database {
    data_dir: PathBuf,
    pool: SharedPool<Catalog>,
    heaps: AHashMap<FileId, HeapFile>,
    indexes: AHashMap<FileId, IndexFile>,
}

impl Database {
    /// Start an empty database in `data_dir`
    pub fn create<P: AsRef<Path>>(data_dir: P, pool_pages: usize) -> DatabaseResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if Catalog::exists(&data_dir) {
            return Err(DatabaseError::DatabaseExists(data_dir.display().to_string()));
        }
        fs::create_dir_all(&data_dir)?;

        let catalog = Catalog::new();
        catalog.save(&data_dir)?;
        info!("created database in {}", data_dir.display());

        Ok(Self {
            data_dir,
            pool: BufferPool::with_capacity(catalog, pool_pages).into_shared(),
            heaps: AHashMap::new(),
            indexes: AHashMap::new(),
        })
    }

    /// Open the database saved in `data_dir`
    pub fn open<P: AsRef<Path>>(data_dir: P, pool_pages: usize) -> DatabaseResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if !Catalog::exists(&data_dir) {
            return Err(DatabaseError::DatabaseNotFound(data_dir.display().to_string()));
        }

        let catalog = Catalog::load(&data_dir)?;
        let tables: Vec<(FileId, Arc<TupleDesc>)> = catalog
            .table_names()
            .into_iter()
            .map(|name| -> Result<_, CatalogError> {
                let id = catalog.table_id(name)?;
                Ok((id, catalog.schema_for(id)?))
            })
            .collect::<Result<_, CatalogError>>()?;
        let index_defs: Vec<IndexDef> = catalog.index_defs().into_iter().cloned().collect();

        let mut pool = BufferPool::with_capacity(catalog, pool_pages);
        let mut heaps = AHashMap::new();
        for (id, desc) in tables {
            heaps.insert(id, HeapFile::open(&mut pool, id, desc)?);
        }
        let mut indexes = AHashMap::new();
        for def in index_defs {
            let index = IndexFile::open(
                &mut pool,
                def.id,
                def.table_id,
                def.key_field,
                def.key_type,
                def.bucket_count,
            )?;
            indexes.insert(def.id, index);
        }

        Ok(Self {
            data_dir,
            pool: pool.into_shared(),
            heaps,
            indexes,
        })
    }

    /// Open `data_dir` if it holds a database, otherwise create one there
    pub fn open_or_create<P: AsRef<Path>>(data_dir: P, pool_pages: usize) -> DatabaseResult<Self> {
        if Catalog::exists(data_dir.as_ref()) {
            Self::open(data_dir, pool_pages)
        } else {
            Self::create(data_dir, pool_pages)
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Shared handle to the buffer pool
    pub fn pool(&self) -> SharedPool<Catalog> {
        self.pool.clone()
    }

    pub fn pool_stats(&self) -> PoolStats {
        lock_pool(&self.pool).stats()
    }

    /// Register every table in a text schema file; returns the new table names
    pub fn load_schema<P: AsRef<Path>>(&mut self, schema_path: P) -> DatabaseResult<Vec<String>> {
        let mut pool = lock_pool(&self.pool);
        let ids = pool
            .catalog_mut()
            .load_schema(schema_path, &self.data_dir)?;

        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            let (name, desc) = {
                let def = pool.catalog().table_def(id)?;
                (def.name.clone(), def.desc.clone())
            };
            self.heaps.insert(id, HeapFile::open(&mut pool, id, desc)?);
            names.push(name);
        }

        pool.catalog().save(&self.data_dir)?;
        Ok(names)
    }

    /// Create an empty table stored in `<data_dir>/<name>.dat`
    pub fn create_table(&mut self, name: &str, desc: TupleDesc) -> DatabaseResult<FileId> {
        let mut pool = lock_pool(&self.pool);
        let path = self.data_dir.join(format!("{}.dat", name));
        let id = pool.catalog_mut().add_heap(name, path, desc)?;
        let desc = pool.catalog().schema_for(id)?;
        self.heaps.insert(id, HeapFile::open(&mut pool, id, desc)?);
        pool.catalog().save(&self.data_dir)?;
        Ok(id)
    }

    pub fn table_id(&self, name: &str) -> DatabaseResult<FileId> {
        Ok(lock_pool(&self.pool).catalog().table_id(name)?)
    }

    pub fn schema(&self, table: &str) -> DatabaseResult<Arc<TupleDesc>> {
        let pool = lock_pool(&self.pool);
        let id = pool.catalog().table_id(table)?;
        Ok(pool.catalog().schema_for(id)?)
    }

    pub fn table_names(&self) -> Vec<String> {
        lock_pool(&self.pool)
            .catalog()
            .table_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn index_names(&self) -> Vec<String> {
        lock_pool(&self.pool)
            .catalog()
            .index_defs()
            .into_iter()
            .map(|def| def.name.clone())
            .collect()
    }

    /// Type of the key an index is built on
    pub fn index_key_type(&self, index: &str) -> DatabaseResult<crate::record::Type> {
        Ok(self.index(index)?.key_type())
    }

    /// Build a hash index on `field` of `table`, indexing the rows already
    /// stored
    pub fn create_index(
        &mut self,
        name: &str,
        table: &str,
        field: &str,
        bucket_count: usize,
    ) -> DatabaseResult<FileId> {
        let mut pool = lock_pool(&self.pool);
        let table_id = pool.catalog().table_id(table)?;
        let desc = pool.catalog().schema_for(table_id)?;
        let key_field = desc.name_to_index(field)?;
        let key_type = desc.field_type(key_field)?;

        let path = self.data_dir.join(format!("{}.idx", name));
        let id = pool
            .catalog_mut()
            .add_index(name, path, table_id, key_field, bucket_count)?;

        let tid = TransactionId::new();
        let mut index = IndexFile::create(
            &mut pool,
            tid,
            id,
            table_id,
            key_field,
            key_type,
            bucket_count,
        )?;

        let heap = self.heap(table_id)?;
        let mut indexed = 0;
        for page_no in 0..heap.num_pages() {
            for tuple in heap.page_tuples(&mut pool, page_no)? {
                index.add_tuple(&mut pool, tid, &tuple)?;
                indexed += 1;
            }
        }
        info!("index {} built over {} existing rows of {}", name, indexed, table);

        self.indexes.insert(id, index);
        pool.catalog().save(&self.data_dir)?;
        Ok(id)
    }

    /// Insert a row built from `fields` into `table`
    pub fn insert(&mut self, table: &str, fields: Vec<Field>) -> DatabaseResult<RecordId> {
        let table_id = self.table_id(table)?;
        let desc = self.heap(table_id)?.desc().clone();
        let mut tuple = Tuple::new(desc, fields)?;
        self.insert_tuple(TransactionId::new(), table_id, &mut tuple)?;
        tuple
            .record_id()
            .ok_or(DatabaseError::RecordError(crate::record::RecordError::MissingRecordId))
    }

    /// Add `tuple` to a table and all of its indexes on behalf of `tid`.
    /// Returns every page dirtied. If any index rejects the entry, the
    /// entries already added and the heap row are removed again.
    pub fn insert_tuple(
        &mut self,
        tid: TransactionId,
        table_id: FileId,
        tuple: &mut Tuple,
    ) -> DatabaseResult<Vec<PageId>> {
        let mut pool = lock_pool(&self.pool);
        let index_ids = index_ids_on(pool.catalog(), table_id);

        let heap = self
            .heaps
            .get_mut(&table_id)
            .ok_or(crate::file::FileError::UnknownFile(table_id))?;
        let mut dirtied = heap.add_tuple(&mut pool, tid, tuple)?;

        let mut added = Vec::new();
        for id in index_ids {
            let Some(index) = self.indexes.get_mut(&id) else {
                continue;
            };
            match index.add_tuple(&mut pool, tid, tuple) {
                Ok(pages) => {
                    dirtied.extend(pages);
                    added.push(id);
                }
                Err(err) => {
                    warn!("index {} rejected a row of table {}: {}", id, table_id, err);
                    for id in added {
                        if let Some(index) = self.indexes.get_mut(&id) {
                            if let Err(undo) = index.delete_tuple(&mut pool, tid, tuple) {
                                error!("failed to take back entry from index {}: {}", id, undo);
                            }
                        }
                    }
                    if let Err(undo) = heap.delete_tuple(&mut pool, tid, tuple) {
                        error!("failed to take back row from table {}: {}", table_id, undo);
                    }
                    tuple.set_record_id(None);
                    return Err(err.into());
                }
            }
        }
        Ok(dirtied)
    }

    /// Remove `tuple` from its table and all of its indexes on behalf of
    /// `tid`. Returns every page dirtied. Nothing is removed unless the row
    /// and every index entry for it are present.
    pub fn delete_tuple(&mut self, tid: TransactionId, tuple: &Tuple) -> DatabaseResult<Vec<PageId>> {
        let rid = tuple
            .record_id()
            .ok_or(crate::record::RecordError::MissingRecordId)?;
        let table_id = rid.page_id.file_id;

        let mut pool = lock_pool(&self.pool);
        let index_ids = index_ids_on(pool.catalog(), table_id);

        let heap = self
            .heaps
            .get_mut(&table_id)
            .ok_or(crate::file::FileError::UnknownFile(table_id))?;
        heap.read_tuple(&mut pool, rid)?;
        for id in &index_ids {
            if let Some(index) = self.indexes.get(id) {
                index.locate_tuple(&mut pool, tuple)?;
            }
        }

        let mut dirtied = Vec::new();
        let mut removed = Vec::new();
        let mut outcome: DatabaseResult<()> = Ok(());
        for id in index_ids {
            let Some(index) = self.indexes.get_mut(&id) else {
                continue;
            };
            match index.delete_tuple(&mut pool, tid, tuple) {
                Ok(pages) => {
                    dirtied.extend(pages);
                    removed.push(id);
                }
                Err(err) => {
                    outcome = Err(err.into());
                    break;
                }
            }
        }
        if outcome.is_ok() {
            outcome = heap
                .delete_tuple(&mut pool, tid, tuple)
                .map(|pages| dirtied.extend(pages))
                .map_err(DatabaseError::from);
        }

        if let Err(err) = outcome {
            for id in removed {
                if let Some(index) = self.indexes.get_mut(&id) {
                    if let Err(undo) = index.add_tuple(&mut pool, tid, tuple) {
                        error!("failed to restore entry in index {}: {}", id, undo);
                    }
                }
            }
            return Err(err);
        }
        Ok(dirtied)
    }

    /// Read the row stored at `rid`
    pub fn fetch_tuple(&self, rid: RecordId) -> DatabaseResult<Tuple> {
        let heap = self.heap(rid.page_id.file_id)?;
        let mut pool = lock_pool(&self.pool);
        Ok(heap.read_tuple(&mut pool, rid)?)
    }

    /// Lazy scan over every row of `table`
    pub fn scan(&self, table: &str) -> DatabaseResult<HeapScan<Catalog>> {
        let table_id = self.table_id(table)?;
        Ok(self.heap(table_id)?.scan(self.pool.clone()))
    }

    /// Every row of `table`, in storage order
    pub fn scan_all(&self, table: &str) -> DatabaseResult<Vec<Tuple>> {
        let mut scan = self.scan(table)?;
        scan.open()?;
        let tuples = scan.collect_tuples()?;
        scan.close();
        Ok(tuples)
    }

    /// Record ids of the rows whose indexed key satisfies `pred`
    pub fn index_rids(&self, index: &str, pred: &AccessPredicate) -> DatabaseResult<Vec<RecordId>> {
        let index = self.index(index)?;
        let mut pool = lock_pool(&self.pool);
        Ok(index.search(&mut pool, pred)?)
    }

    /// Rows whose indexed key satisfies `pred`
    pub fn index_search(&self, index: &str, pred: &AccessPredicate) -> DatabaseResult<Vec<Tuple>> {
        let index = self.index(index)?;
        let heap = self.heap(index.table_id())?;
        let mut pool = lock_pool(&self.pool);
        let rids = index.search(&mut pool, pred)?;
        rids.into_iter()
            .map(|rid| -> DatabaseResult<Tuple> { Ok(heap.read_tuple(&mut pool, rid)?) })
            .collect()
    }

    /// Index entries whose key satisfies `pred`
    pub fn filter_scan(&self, index: &str, pred: &AccessPredicate) -> DatabaseResult<TupleListIter> {
        let index = self.index(index)?;
        let mut pool = lock_pool(&self.pool);
        Ok(index.filter_scan(&mut pool, pred)?)
    }

    /// Every entry of an index
    pub fn index_entries(&self, index: &str) -> DatabaseResult<TupleListIter> {
        let index = self.index(index)?;
        let mut pool = lock_pool(&self.pool);
        Ok(index.iterator(&mut pool)?)
    }

    /// Entry and page counts of every bucket chain of an index
    pub fn bucket_stats(&self, index: &str) -> DatabaseResult<Vec<BucketStats>> {
        let index = self.index(index)?;
        let mut pool = lock_pool(&self.pool);
        (0..index.bucket_count())
            .map(|bucket| -> DatabaseResult<BucketStats> {
                Ok(BucketStats {
                    bucket,
                    entries: index.entry_count_in_bucket(&mut pool, bucket)?,
                    pages: index.chain_len(&mut pool, bucket)?,
                })
            })
            .collect()
    }

    /// Insert every row of a header-less CSV file into `table`; returns the
    /// number of rows inserted
    pub fn load_csv<P: AsRef<Path>>(&mut self, table: &str, csv_path: P) -> DatabaseResult<usize> {
        let table_id = self.table_id(table)?;
        let desc = self.heap(table_id)?.desc().clone();
        let tid = TransactionId::new();

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(csv_path.as_ref())?;

        let mut inserted = 0;
        for result in reader.records() {
            let record = result?;
            if record.len() != desc.num_fields() {
                return Err(crate::record::RecordError::ArityMismatch {
                    expected: desc.num_fields(),
                    actual: record.len(),
                }
                .into());
            }
            let fields = desc
                .fields()
                .iter()
                .zip(record.iter())
                .map(|(def, text)| def.field_type.parse_field(text))
                .collect::<Result<Vec<_>, _>>()?;
            let mut tuple = Tuple::new(desc.clone(), fields)?;
            self.insert_tuple(tid, table_id, &mut tuple)?;
            inserted += 1;
        }

        info!(
            "loaded {} rows into {} from {}",
            inserted,
            table,
            csv_path.as_ref().display()
        );
        Ok(inserted)
    }

    /// Write every dirty page and the catalog to disk
    pub fn flush(&self) -> DatabaseResult<()> {
        let mut pool = lock_pool(&self.pool);
        pool.flush_all()?;
        pool.catalog().save(&self.data_dir)?;
        Ok(())
    }

    /// Flush and release the database
    pub fn close(self) -> DatabaseResult<()> {
        self.flush()
    }

    fn heap(&self, id: FileId) -> DatabaseResult<&HeapFile> {
        self.heaps
            .get(&id)
            .ok_or_else(|| crate::file::FileError::UnknownFile(id).into())
    }

    fn index(&self, name: &str) -> DatabaseResult<&IndexFile> {
        let id = lock_pool(&self.pool)
            .catalog()
            .index_by_name(name)
            .map(|def| def.id);
        id.and_then(|id| self.indexes.get(&id))
            .ok_or_else(|| DatabaseError::IndexNotFound(name.to_string()))
    }
}

fn index_ids_on(catalog: &Catalog, table_id: FileId) -> Vec<FileId> {
    catalog
        .indexes_on(table_id)
        .into_iter()
        .map(|def| def.id)
        .collect()
}

#[cfg(test)]
mod tests;
