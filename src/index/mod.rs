//! Static hash indexes over heap tables

mod error;
mod hash;
mod index_file;
mod page;
mod predicate;

pub use error::{IndexError, IndexResult};
pub use hash::{DEFAULT_BUCKETS, HASH_MULTIPLIER, HashScheme};
pub use index_file::IndexFile;
pub use page::{IndexPage, NO_OVERFLOW, OVERFLOW_HEADER_LEN};
pub use predicate::AccessPredicate;
