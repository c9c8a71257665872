//! Tagged values for heterogeneous `info` maps
//!
//! Call annotations carry arbitrary per-caller fields. They are modelled as a
//! closed sum type so the codec can switch on a one-byte tag instead of
//! dealing with open-ended objects.

use std::collections::BTreeMap;
use std::fmt;

use super::varint::{write_ivarint, write_uvarint};
use super::{insert_ordered, write_bool, write_f64, write_str, ByteReader, Decode, Encode};
use crate::error::CodecError;

/// A string-keyed map of tagged values, ordered by key for stable encoding
pub type Info = BTreeMap<String, Value>;

const TAG_INT: u8 = 0;
const TAG_FLOAT: u8 = 1;
const TAG_STRING: u8 = 2;
const TAG_LIST: u8 = 3;
const TAG_MAP: u8 = 4;
const TAG_BOOL: u8 = 5;

/// The deepest list/map nesting the decoder accepts
pub const MAX_VALUE_DEPTH: usize = 64;

/// An opaque annotation value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Info),
    /// Presence flags (e.g. VCF `DB`, `SOMATIC`)
    Bool(bool),
}
impl Value {
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&Info> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => TAG_INT,
            Self::Float(_) => TAG_FLOAT,
            Self::Str(_) => TAG_STRING,
            Self::List(_) => TAG_LIST,
            Self::Map(_) => TAG_MAP,
            Self::Bool(_) => TAG_BOOL,
        }
    }

    fn decode_nested(reader: &mut ByteReader<'_>, depth: usize) -> Result<Self, CodecError> {
        if depth > MAX_VALUE_DEPTH {
            return Err(CodecError::NestingTooDeep(MAX_VALUE_DEPTH));
        }
        match reader.read_u8()? {
            TAG_INT => reader.read_ivarint().map(Self::Int),
            TAG_FLOAT => reader.read_f64().map(Self::Float),
            TAG_STRING => reader.read_str().map(|s| Self::Str(s.to_string())),
            TAG_BOOL => reader.read_bool().map(Self::Bool),
            TAG_LIST => {
                let (count, hint) = reader.read_count()?;
                let mut items = Vec::with_capacity(hint);
                for _ in 0..count {
                    items.push(Self::decode_nested(reader, depth + 1)?);
                }
                Ok(Self::List(items))
            }
            TAG_MAP => {
                let (count, _) = reader.read_count()?;
                let mut map = Info::new();
                for _ in 0..count {
                    let key = reader.read_str()?.to_string();
                    let value = Self::decode_nested(reader, depth + 1)?;
                    insert_ordered(&mut map, key, value)?;
                }
                Ok(Self::Map(map))
            }
            tag => Err(CodecError::UnknownValueTag(tag)),
        }
    }
}

impl Encode for Value {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.tag());
        match self {
            Self::Int(v) => write_ivarint(buf, *v),
            Self::Float(v) => write_f64(buf, *v),
            Self::Str(v) => write_str(buf, v),
            Self::Bool(v) => write_bool(buf, *v),
            Self::List(items) => {
                write_uvarint(buf, items.len() as u64);
                for item in items {
                    item.encode_into(buf);
                }
            }
            Self::Map(map) => map.encode_into(buf),
        }
    }
}
impl Decode for Value {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Self::decode_nested(reader, 0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{key}:{value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}
impl From<Info> for Value {
    fn from(v: Info) -> Self {
        Self::Map(v)
    }
}
