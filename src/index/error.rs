use thiserror::Error;

use crate::file::{FileError, FileId};
use crate::record::RecordError;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur during index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("No index entry for key {key} in bucket {bucket}")]
    EntryNotFound { key: String, bucket: usize },

    #[error("Key field {field} out of range for tuples with {num_fields} fields")]
    InvalidKeyField { field: usize, num_fields: usize },

    #[error("Bucket {bucket} out of range (index has {bucket_count} buckets)")]
    BucketOutOfRange { bucket: usize, bucket_count: usize },

    #[error("File {0} is not an index")]
    NotAnIndex(FileId),
}
