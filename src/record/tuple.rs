use std::fmt;
use std::sync::Arc;

use super::error::{RecordError, RecordResult};
use super::schema::TupleDesc;
use super::types::Field;
use crate::file::PageId;

/// Slot identifier within a page
pub type SlotId = usize;

/// Physical location of a tuple (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.page_id, self.slot)
    }
}

/// A row of typed fields conforming to a descriptor
#[derive(Debug, Clone)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Create a tuple, checking arity and field types against `desc`
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> RecordResult<Self> {
        if fields.len() != desc.num_fields() {
            return Err(RecordError::ArityMismatch {
                expected: desc.num_fields(),
                actual: fields.len(),
            });
        }

        for (i, field) in fields.iter().enumerate() {
            let expected = desc.field_type(i)?;
            if field.field_type() != expected {
                return Err(RecordError::TypeMismatch {
                    expected,
                    actual: field.field_type(),
                });
            }
        }

        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> RecordResult<&Field> {
        self.fields.get(index).ok_or(RecordError::FieldOutOfBounds {
            index,
            len: self.fields.len(),
        })
    }

    /// Replace field `index`, which must keep its declared type
    pub fn set_field(&mut self, index: usize, field: Field) -> RecordResult<()> {
        let expected = self.desc.field_type(index)?;
        if field.field_type() != expected {
            return Err(RecordError::TypeMismatch {
                expected,
                actual: field.field_type(),
            });
        }
        self.fields[index] = field;
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Write the tuple into `out`, which must be exactly `desc.size()` bytes
    pub fn serialize_into(&self, out: &mut [u8]) -> RecordResult<()> {
        if out.len() != self.desc.size() {
            return Err(RecordError::Deserialization(format!(
                "tuple buffer is {} bytes, expected {}",
                out.len(),
                self.desc.size()
            )));
        }

        let mut offset = 0;
        for field in &self.fields {
            let len = field.field_type().len();
            field.serialize_into(&mut out[offset..offset + len])?;
            offset += len;
        }
        Ok(())
    }

    pub fn serialize(&self) -> RecordResult<Vec<u8>> {
        let mut out = vec![0u8; self.desc.size()];
        self.serialize_into(&mut out)?;
        Ok(out)
    }

    /// Decode a tuple laid out according to `desc`
    pub fn deserialize(desc: Arc<TupleDesc>, bytes: &[u8]) -> RecordResult<Self> {
        if bytes.len() != desc.size() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes for tuple, got {}",
                desc.size(),
                bytes.len()
            )));
        }

        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for def in desc.fields() {
            let len = def.field_type.len();
            fields.push(Field::deserialize(&bytes[offset..offset + len], def.field_type)?);
            offset += len;
        }

        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }
}

/// Tuples compare by field values only
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|field| field.to_string()).collect();
        f.write_str(&parts.join("\t"))
    }
}
