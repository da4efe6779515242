use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::{RecordError, RecordResult};

/// Maximum number of bytes stored for a string field
pub const STRING_LEN: usize = 128;

/// Represents a field data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int, // 4 bytes
    Str, // 4-byte length + STRING_LEN bytes
}

impl Type {
    /// Get the size in bytes for this data type
    pub fn len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::Str => 4 + STRING_LEN,
        }
    }

    /// Name used in schema files and catalog metadata
    pub fn name(&self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Str => "string",
        }
    }

    /// Parse a textual field value of this type
    pub fn parse_field(&self, text: &str) -> RecordResult<Field> {
        match self {
            Type::Int => text
                .trim()
                .parse::<i32>()
                .map(Field::Int)
                .map_err(|e| RecordError::Deserialization(format!("bad int {:?}: {}", text, e))),
            Type::Str => Field::string(text),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Type {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" => Ok(Type::Int),
            "string" => Ok(Type::Str),
            other => Err(format!("unknown type {}", other)),
        }
    }
}

/// Types are stored by their schema-file names ("int" / "string")
impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Comparison operators usable in predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    /// Substring match for strings, equality for ints
    Like,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::NotEquals => "<>",
            Op::GreaterThan => ">",
            Op::GreaterThanOrEq => ">=",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::Like => "like",
        };
        f.write_str(s)
    }
}

impl FromStr for Op {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => Ok(Op::Equals),
            "<>" | "!=" | "ne" => Ok(Op::NotEquals),
            ">" | "gt" => Ok(Op::GreaterThan),
            ">=" | "ge" => Ok(Op::GreaterThanOrEq),
            "<" | "lt" => Ok(Op::LessThan),
            "<=" | "le" => Ok(Op::LessThanOrEq),
            "like" => Ok(Op::Like),
            other => Err(format!("unknown operator {}", other)),
        }
    }
}

/// A single typed field value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    /// Build a string field, rejecting values longer than `STRING_LEN` bytes
    pub fn string(s: impl Into<String>) -> RecordResult<Self> {
        let s = s.into();
        if s.len() > STRING_LEN {
            return Err(RecordError::StringTooLong {
                len: s.len(),
                max: STRING_LEN,
            });
        }
        Ok(Field::Str(s))
    }

    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::Str,
        }
    }

    /// Evaluate `self <op> other`
    pub fn compare(&self, op: Op, other: &Field) -> RecordResult<bool> {
        let ordering = match (self, other) {
            (Field::Int(a), Field::Int(b)) => a.cmp(b),
            (Field::Str(a), Field::Str(b)) => {
                if op == Op::Like {
                    return Ok(a.contains(b.as_str()));
                }
                a.cmp(b)
            }
            _ => {
                return Err(RecordError::TypeMismatch {
                    expected: self.field_type(),
                    actual: other.field_type(),
                });
            }
        };

        Ok(match op {
            Op::Equals | Op::Like => ordering == Ordering::Equal,
            Op::NotEquals => ordering != Ordering::Equal,
            Op::GreaterThan => ordering == Ordering::Greater,
            Op::GreaterThanOrEq => ordering != Ordering::Less,
            Op::LessThan => ordering == Ordering::Less,
            Op::LessThanOrEq => ordering != Ordering::Greater,
        })
    }

    /// Write this field into `out`, which must be exactly `field_type().len()` bytes
    pub fn serialize_into(&self, out: &mut [u8]) -> RecordResult<()> {
        let expected = self.field_type().len();
        if out.len() != expected {
            return Err(RecordError::Deserialization(format!(
                "field buffer is {} bytes, expected {}",
                out.len(),
                expected
            )));
        }

        match self {
            Field::Int(i) => out.copy_from_slice(&i.to_le_bytes()),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > STRING_LEN {
                    return Err(RecordError::StringTooLong {
                        len: bytes.len(),
                        max: STRING_LEN,
                    });
                }
                out.fill(0);
                out[..4].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
                out[4..4 + bytes.len()].copy_from_slice(bytes);
            }
        }
        Ok(())
    }

    /// Read a field of type `ty` from `bytes`
    pub fn deserialize(bytes: &[u8], ty: Type) -> RecordResult<Self> {
        if bytes.len() != ty.len() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes for {}, got {}",
                ty.len(),
                ty,
                bytes.len()
            )));
        }

        match ty {
            Type::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Ok(Field::Int(i32::from_le_bytes(buf)))
            }
            Type::Str => {
                let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
                if len > STRING_LEN {
                    return Err(RecordError::Deserialization(format!(
                        "string length {} exceeds {}",
                        len, STRING_LEN
                    )));
                }
                let s = String::from_utf8(bytes[4..4 + len].to_vec())
                    .map_err(|e| RecordError::Deserialization(format!("Invalid UTF-8: {}", e)))?;
                Ok(Field::Str(s))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(i) => write!(f, "{}", i),
            Field::Str(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_len() {
        assert_eq!(Type::Int.len(), 4);
        assert_eq!(Type::Str.len(), 132);
    }

    #[test]
    fn test_type_from_str() {
        assert_eq!("INT".parse::<Type>(), Ok(Type::Int));
        assert_eq!(" string ".parse::<Type>(), Ok(Type::Str));
        assert!("float".parse::<Type>().is_err());
    }

    #[test]
    fn test_int_serialization() {
        let field = Field::Int(-42);
        let mut buf = [0u8; 4];
        field.serialize_into(&mut buf).unwrap();
        assert_eq!(Field::deserialize(&buf, Type::Int).unwrap(), field);
    }

    #[test]
    fn test_string_serialization_layout() {
        let field = Field::string("hello").unwrap();
        let mut buf = vec![0xffu8; Type::Str.len()];
        field.serialize_into(&mut buf).unwrap();

        assert_eq!(&buf[..4], &5u32.to_le_bytes());
        assert_eq!(&buf[4..9], b"hello");
        assert!(buf[9..].iter().all(|&b| b == 0));
        assert_eq!(Field::deserialize(&buf, Type::Str).unwrap(), field);
    }

    #[test]
    fn test_string_too_long() {
        let long = "x".repeat(STRING_LEN + 1);
        assert!(matches!(
            Field::string(long),
            Err(RecordError::StringTooLong { .. })
        ));
        assert!(Field::string("x".repeat(STRING_LEN)).is_ok());
    }

    #[test]
    fn test_compare_ints() {
        let five = Field::Int(5);
        let seven = Field::Int(7);
        assert!(five.compare(Op::LessThan, &seven).unwrap());
        assert!(five.compare(Op::LessThanOrEq, &five).unwrap());
        assert!(seven.compare(Op::GreaterThan, &five).unwrap());
        assert!(seven.compare(Op::GreaterThanOrEq, &seven).unwrap());
        assert!(five.compare(Op::NotEquals, &seven).unwrap());
        assert!(!five.compare(Op::Equals, &seven).unwrap());
        assert!(five.compare(Op::Like, &Field::Int(5)).unwrap());
    }

    #[test]
    fn test_compare_strings() {
        let a = Field::string("apple").unwrap();
        let b = Field::string("banana").unwrap();
        assert!(a.compare(Op::LessThan, &b).unwrap());
        assert!(b.compare(Op::Like, &Field::string("nan").unwrap()).unwrap());
        assert!(!a.compare(Op::Like, &Field::string("nan").unwrap()).unwrap());
    }

    #[test]
    fn test_compare_type_mismatch() {
        let result = Field::Int(1).compare(Op::Equals, &Field::string("1").unwrap());
        assert!(matches!(result, Err(RecordError::TypeMismatch { .. })));
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(Type::Int.parse_field(" 12 ").unwrap(), Field::Int(12));
        assert_eq!(
            Type::Str.parse_field("abc").unwrap(),
            Field::Str("abc".to_string())
        );
        assert!(Type::Int.parse_field("abc").is_err());
    }

    #[test]
    fn test_op_round_trip_display() {
        for op in [
            Op::Equals,
            Op::NotEquals,
            Op::GreaterThan,
            Op::GreaterThanOrEq,
            Op::LessThan,
            Op::LessThanOrEq,
            Op::Like,
        ] {
            assert_eq!(op.to_string().parse::<Op>(), Ok(op));
        }
    }
}
