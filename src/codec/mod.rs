//! # Canonical entity encoding
//!
//! Every entity that passes through a [`KeyValueStore`](crate::store::KeyValueStore)
//! is stored in one canonical byte form. The same bytes are used for
//! persistence and for key equality, so the encoding must be byte-stable:
//! identical logical entities always produce identical bytes.
//!
//! ## Conventions
//!
//! | Field kind | Encoding |
//! |------------|----------|
//! | signed integer | zigzag, then packed 7-bit groups ([`varint`]) |
//! | length / count | packed 7-bit groups |
//! | float | 8 bytes little-endian IEEE-754 |
//! | bool | one byte, `0` or `1` |
//! | string | length prefix + UTF-8 bytes |
//! | bases | length prefix + raw ASCII bytes |
//! | list / set | count prefix + elements in order (sets ascending) |
//! | map | count prefix + `(key, value)` pairs, keys ascending |
//! | opaque value | one tag byte + payload ([`Value`]) |
//!
//! Entity fields are written in declaration order with no framing between
//! them; decoding a buffer must consume it exactly.

mod reader;
pub mod value;
pub mod varint;

use std::collections::{BTreeMap, BTreeSet};

use byteorder::{ByteOrder, LittleEndian};

pub use reader::ByteReader;
pub use value::{Info, Value};

use crate::error::CodecError;
use varint::{write_ivarint, write_uvarint};

/// Types with a canonical binary encoding
pub trait Encode {
    /// Appends the canonical encoding of `self` to `buf`
    fn encode_into(&self, buf: &mut Vec<u8>);

    /// Returns the canonical encoding of `self`
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }
}

/// Types that can be rebuilt from their canonical encoding
pub trait Decode: Sized {
    /// Decodes one value from the reader, advancing past it
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError>;

    /// Decodes a value that must span the whole buffer
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

/// Marker for types that round-trip through the canonical encoding
pub trait Codec: Encode + Decode {}
impl<T: Encode + Decode> Codec for T {}

/// Appends a length-prefixed byte slice
pub fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_uvarint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Appends a length-prefixed UTF-8 string
pub fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_bytes(buf, s.as_bytes());
}

pub fn write_f64(buf: &mut Vec<u8>, value: f64) {
    let mut raw = [0u8; 8];
    LittleEndian::write_f64(&mut raw, value);
    buf.extend_from_slice(&raw);
}

pub fn write_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(u8::from(value));
}

impl Encode for i32 {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_ivarint(buf, i64::from(*self));
    }
}
impl Decode for i32 {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        reader.read_i32()
    }
}

impl Encode for i64 {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_ivarint(buf, *self);
    }
}
impl Decode for i64 {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        reader.read_ivarint()
    }
}

impl Encode for u64 {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_uvarint(buf, *self);
    }
}
impl Decode for u64 {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        reader.read_uvarint()
    }
}

impl Encode for f64 {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_f64(buf, *self);
    }
}
impl Decode for f64 {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        reader.read_f64()
    }
}

impl Encode for bool {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_bool(buf, *self);
    }
}
impl Decode for bool {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        reader.read_bool()
    }
}

impl Encode for String {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_str(buf, self);
    }
}
impl Decode for String {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        reader.read_str().map(str::to_string)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_uvarint(buf, self.len() as u64);
        for item in self {
            item.encode_into(buf);
        }
    }
}
impl<T: Decode> Decode for Vec<T> {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let (count, hint) = reader.read_count()?;
        let mut items = Vec::with_capacity(hint);
        for _ in 0..count {
            items.push(T::decode_from(reader)?);
        }
        Ok(items)
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_uvarint(buf, self.len() as u64);
        for item in self {
            item.encode_into(buf);
        }
    }
}
impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let (count, _) = reader.read_count()?;
        let mut items = BTreeSet::new();
        for _ in 0..count {
            let item = T::decode_from(reader)?;
            if items.last().is_some_and(|last| *last >= item) {
                return Err(CodecError::UnorderedKeys);
            }
            items.insert(item);
        }
        Ok(items)
    }
}

/// Appends a decoded entry, rejecting keys that do not strictly ascend
pub(crate) fn insert_ordered<V>(
    map: &mut BTreeMap<String, V>,
    key: String,
    value: V,
) -> Result<(), CodecError> {
    if map.last_key_value().is_some_and(|(last, _)| *last >= key) {
        return Err(CodecError::UnorderedKeys);
    }
    map.insert(key, value);
    Ok(())
}

impl<V: Encode> Encode for BTreeMap<String, V> {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_uvarint(buf, self.len() as u64);
        for (key, value) in self {
            write_str(buf, key);
            value.encode_into(buf);
        }
    }
}
impl<V: Decode> Decode for BTreeMap<String, V> {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let (count, _) = reader.read_count()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = reader.read_str()?.to_string();
            let value = V::decode_from(reader)?;
            insert_ordered(&mut map, key, value)?;
        }
        Ok(map)
    }
}
