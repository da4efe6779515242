use crate::file::{FileError, FileId, PageId};
use thiserror::Error;

use super::types::Type;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("A schema needs at least one field")]
    EmptySchema,

    #[error("Field index {index} out of bounds for {len} fields")]
    FieldOutOfBounds { index: usize, len: usize },

    #[error("No field named {0}")]
    UnknownField(String),

    #[error("Expected {expected} fields, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Tuple descriptor {actual} does not match {expected}")]
    DescMismatch { expected: String, actual: String },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: Type, actual: Type },

    #[error("String of {len} bytes exceeds maximum of {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("No tuple stored at page {page}, slot {slot}")]
    TupleNotFound { page: PageId, slot: usize },

    #[error("Record belongs to file {found}, not {expected}")]
    WrongTable { expected: FileId, found: FileId },

    #[error("Page full: {0}")]
    PageFull(PageId),

    #[error("Tuple of {0} bytes does not fit in a page")]
    TupleTooLarge(usize),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Iterator is not open")]
    IteratorClosed,

    #[error("No more tuples")]
    NoMoreTuples,
}

pub type RecordResult<T> = Result<T, RecordError>;
