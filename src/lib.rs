pub mod catalog;
pub mod database;
pub mod file;
pub mod index;
pub mod record;

pub use catalog::{Catalog, CatalogError, CatalogResult};
pub use database::{BucketStats, Database, DatabaseError, DatabaseResult};
pub use file::{BufferPool, DEFAULT_POOL_PAGES, FileId, PAGE_SIZE, PageId, TransactionId};
pub use index::{AccessPredicate, DEFAULT_BUCKETS, HashScheme, IndexFile};
pub use record::{Field, HeapFile, Op, RecordId, Tuple, TupleDesc, Type};
