//! Packed (variable-length) integer encoding
//!
//! Unsigned values are written seven bits at a time, least significant group
//! first, with the high bit of each byte set when another group follows.
//! Signed values are zigzag-mapped first so that small negative numbers stay
//! short.

/// The maximum number of bytes a packed `u64` can occupy
pub const MAX_VARINT_LEN: usize = 10;

/// Appends the packed encoding of `value` to `buf`
pub fn write_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Appends the packed zigzag encoding of `value` to `buf`
pub fn write_ivarint(buf: &mut Vec<u8>, value: i64) {
    write_uvarint(buf, zigzag(value));
}

/// Returns the number of bytes [`write_uvarint`] emits for `value`
#[must_use]
pub fn uvarint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Maps signed integers onto unsigned ones: 0, -1, 1, -2, 2 ... -> 0, 1, 2, 3, 4 ...
#[inline]
#[must_use]
pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag`]
#[inline]
#[must_use]
pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
