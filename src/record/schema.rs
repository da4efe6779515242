use serde::{Deserialize, Serialize};

use super::error::{RecordError, RecordResult};
use super::types::Type;

/// One field of a tuple descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: Option<String>,
    pub field_type: Type,
}

impl FieldDef {
    pub fn new(field_type: Type, name: Option<String>) -> Self {
        Self { name, field_type }
    }
}

/// Ordered list of field types (and optional names) describing a tuple.
///
/// Two descriptors are equal when their field types match position by
/// position; names do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TupleDesc {
    fields: Vec<FieldDef>,
}

impl TupleDesc {
    /// Create an anonymous descriptor from field types
    pub fn new(types: Vec<Type>) -> RecordResult<Self> {
        Self::from_fields(types.into_iter().map(|t| FieldDef::new(t, None)).collect())
    }

    /// Create a descriptor with named fields
    pub fn with_names<S: Into<String>>(fields: Vec<(Type, S)>) -> RecordResult<Self> {
        Self::from_fields(
            fields
                .into_iter()
                .map(|(t, name)| FieldDef::new(t, Some(name.into())))
                .collect(),
        )
    }

    pub fn from_fields(fields: Vec<FieldDef>) -> RecordResult<Self> {
        if fields.is_empty() {
            return Err(RecordError::EmptySchema);
        }
        Ok(Self { fields })
    }

    /// Descriptor of a hash index entry: (key, page, slot)
    pub fn index_entry(key_type: Type) -> Self {
        Self {
            fields: vec![
                FieldDef::new(key_type, Some("key".to_string())),
                FieldDef::new(Type::Int, Some("page".to_string())),
                FieldDef::new(Type::Int, Some("slot".to_string())),
            ],
        }
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_type(&self, index: usize) -> RecordResult<Type> {
        self.field(index).map(|f| f.field_type)
    }

    pub fn field_name(&self, index: usize) -> RecordResult<Option<&str>> {
        self.field(index).map(|f| f.name.as_deref())
    }

    /// Find the position of the field called `name`
    pub fn name_to_index(&self, name: &str) -> RecordResult<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
            .ok_or_else(|| RecordError::UnknownField(name.to_string()))
    }

    /// Serialized size of a tuple with this descriptor, in bytes
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.len()).sum()
    }

    fn field(&self, index: usize) -> RecordResult<&FieldDef> {
        self.fields.get(index).ok_or(RecordError::FieldOutOfBounds {
            index,
            len: self.fields.len(),
        })
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl std::fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| match &field.name {
                Some(name) => format!("{} {}", name, field.field_type),
                None => format!("f{} {}", i, field.field_type),
            })
            .collect();
        write!(f, "({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TupleDesc {
        TupleDesc::with_names(vec![(Type::Int, "id"), (Type::Str, "name")]).unwrap()
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(matches!(TupleDesc::new(vec![]), Err(RecordError::EmptySchema)));
    }

    #[test]
    fn test_size() {
        let desc = people();
        assert_eq!(desc.size(), 4 + 132);
        assert_eq!(desc.num_fields(), 2);
    }

    #[test]
    fn test_field_lookup() {
        let desc = people();
        assert_eq!(desc.field_type(1).unwrap(), Type::Str);
        assert_eq!(desc.field_name(0).unwrap(), Some("id"));
        assert_eq!(desc.name_to_index("name").unwrap(), 1);
        assert!(matches!(
            desc.name_to_index("age"),
            Err(RecordError::UnknownField(_))
        ));
        assert!(matches!(
            desc.field_type(2),
            Err(RecordError::FieldOutOfBounds { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_equality_ignores_names() {
        let anonymous = TupleDesc::new(vec![Type::Int, Type::Str]).unwrap();
        assert_eq!(people(), anonymous);
        assert_ne!(people(), TupleDesc::new(vec![Type::Str, Type::Int]).unwrap());
        assert_ne!(people(), TupleDesc::new(vec![Type::Int]).unwrap());
    }

    #[test]
    fn test_index_entry_desc() {
        let desc = TupleDesc::index_entry(Type::Int);
        assert_eq!(desc.size(), 12);
        assert_eq!(desc.name_to_index("slot").unwrap(), 2);
    }

    #[test]
    fn test_json_uses_type_names() {
        let json = serde_json::to_string(&people()).unwrap();
        assert!(json.contains("\"string\""));
        let back: TupleDesc = serde_json::from_str(&json).unwrap();
        assert_eq!(back.field_name(1).unwrap(), Some("name"));
        assert_eq!(back, people());
    }
}
