mod error;
mod heap_file;
mod iterator;
mod page;
mod schema;
mod tuple;
mod types;

pub use error::{RecordError, RecordResult};
pub use heap_file::{HeapFile, HeapScan};
pub use iterator::{DbFileIterator, TupleListIter};
pub use page::{HeapPage, SlotLayout, SlottedPage};
pub use schema::{FieldDef, TupleDesc};
pub use tuple::{RecordId, SlotId, Tuple};
pub use types::{Field, Op, STRING_LEN, Type};
