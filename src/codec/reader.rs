use byteorder::{ByteOrder, LittleEndian};

use super::varint::{unzigzag, MAX_VARINT_LEN};
use crate::error::CodecError;

/// A bounds-checked cursor over an encoded buffer.
///
/// Every read either returns a complete field or fails with a [`CodecError`];
/// the cursor never yields a partially decoded value.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}
impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Number of unread bytes
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Fails if any bytes are left unread
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEnd {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// Reads a packed unsigned integer, rejecting overlong encodings
    pub fn read_uvarint(&mut self) -> Result<u64, CodecError> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            let group = u64::from(byte & 0x7F);
            let shift = 7 * i as u32;

            // the tenth group may only carry the single remaining bit
            if i == MAX_VARINT_LEN - 1 && group > 1 {
                return Err(CodecError::VarintOverflow);
            }
            value |= group << shift;

            if byte & 0x80 == 0 {
                if byte == 0 && i > 0 {
                    return Err(CodecError::NonCanonicalVarint);
                }
                return Ok(value);
            }
        }
        Err(CodecError::VarintOverflow)
    }

    /// Reads a packed zigzag-encoded signed integer
    pub fn read_ivarint(&mut self) -> Result<i64, CodecError> {
        self.read_uvarint().map(unzigzag)
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        i32::try_from(self.read_ivarint()?).map_err(|_| CodecError::VarintOverflow)
    }

    /// Reads a length or count prefix
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let len = self.read_uvarint()?;
        usize::try_from(len).map_err(|_| CodecError::LengthOverflow(len))
    }

    /// Reads a count prefix and bounds the pre-allocation hint by the unread bytes
    ///
    /// Every element occupies at least one byte, so a count larger than the
    /// remaining buffer can never decode; the caller still fails on the read.
    pub fn read_count(&mut self) -> Result<(usize, usize), CodecError> {
        let count = self.read_len()?;
        Ok((count, count.min(self.remaining())))
    }

    /// Reads a length-prefixed byte slice
    pub fn read_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_len()?;
        self.take(len)
    }

    /// Reads a length-prefixed UTF-8 string
    pub fn read_str(&mut self) -> Result<&'a str, CodecError> {
        std::str::from_utf8(self.read_bytes()?).map_err(|_| CodecError::InvalidUtf8)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::codec::varint::{write_ivarint, write_uvarint};

    #[test]
    fn test_read_uvarint() {
        let mut buf = Vec::new();
        for value in [0, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            write_uvarint(&mut buf, value);
        }
        let mut reader = ByteReader::new(&buf);
        for value in [0, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            assert_eq!(reader.read_uvarint().unwrap(), value);
        }
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_truncated_varint() {
        let mut reader = ByteReader::new(&[0x80, 0x80]);
        assert!(matches!(
            reader.read_uvarint(),
            Err(CodecError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_overlong_varint() {
        let mut reader = ByteReader::new(&[0x81, 0x00]);
        assert_eq!(reader.read_uvarint(), Err(CodecError::NonCanonicalVarint));

        let mut reader = ByteReader::new(&[0xFF; 11]);
        assert_eq!(reader.read_uvarint(), Err(CodecError::VarintOverflow));
    }

    #[test]
    fn test_i32_out_of_range() {
        let mut buf = Vec::new();
        write_ivarint(&mut buf, i64::from(i32::MAX) + 1);
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_i32(), Err(CodecError::VarintOverflow));
    }

    #[test]
    fn test_invalid_bool() {
        let mut reader = ByteReader::new(&[2]);
        assert_eq!(reader.read_bool(), Err(CodecError::InvalidBool(2)));
    }

    #[test]
    fn test_bytes_past_end() {
        let mut buf = Vec::new();
        write_uvarint(&mut buf, 10);
        buf.extend_from_slice(b"GAT");
        let mut reader = ByteReader::new(&buf);
        assert_eq!(
            reader.read_bytes(),
            Err(CodecError::UnexpectedEnd {
                needed: 10,
                remaining: 3
            })
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let reader = ByteReader::new(&[1, 2, 3]);
        assert_eq!(reader.finish(), Err(CodecError::TrailingBytes(3)));
    }
}
