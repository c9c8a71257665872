use std::fmt;

use crate::codec::varint::write_uvarint;
use crate::codec::{write_bytes, write_str, ByteReader, Decode, Encode};
use crate::error::{BuilderError, CodecError, Result};

/// Nucleotide bases stored one byte per character.
///
/// Bases are validated as ASCII on construction, which keeps alleles at one
/// byte per base instead of carrying full strings around at genome scale.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bases(Box<[u8]>);
impl Bases {
    pub fn new(bases: impl AsRef<[u8]>) -> Result<Self> {
        let bases = bases.as_ref();
        if !bases.is_ascii() {
            return Err(
                BuilderError::NonAsciiBases(String::from_utf8_lossy(bases).into_owned()).into(),
            );
        }
        Ok(Self(bases.into()))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        // validated ASCII is always valid UTF-8
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl fmt::Debug for Bases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}
impl fmt::Display for Bases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl Encode for Bases {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_bytes(buf, &self.0);
    }
}
impl Decode for Bases {
    fn decode_from(reader: &mut ByteReader<'_>) -> std::result::Result<Self, CodecError> {
        let bytes = reader.read_bytes()?;
        if !bytes.is_ascii() {
            return Err(CodecError::NonAsciiBases);
        }
        Ok(Self(bytes.into()))
    }
}

/// A genomic position plus its reference/alternate allele combination.
///
/// Variants are the deduplication key for calls: equality and hashing are
/// structural over all five fields, and the order of alternative bases
/// matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variant {
    start: i32,
    end: i32,
    reference_name: String,
    reference_bases: Bases,
    alternative_bases: Vec<Bases>,
}
impl Variant {
    #[must_use]
    pub fn builder() -> VariantBuilder {
        VariantBuilder::default()
    }

    #[must_use]
    pub fn start(&self) -> i32 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> i32 {
        self.end
    }

    #[must_use]
    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    #[must_use]
    pub fn reference_bases(&self) -> &Bases {
        &self.reference_bases
    }

    #[must_use]
    pub fn alternative_bases(&self) -> &[Bases] {
        &self.alternative_bases
    }
}
impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{} {}>",
            self.reference_name, self.start, self.end, self.reference_bases
        )?;
        for (i, alt) in self.alternative_bases.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{alt}")?;
        }
        Ok(())
    }
}
impl Encode for Variant {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.start.encode_into(buf);
        self.end.encode_into(buf);
        write_str(buf, &self.reference_name);
        self.reference_bases.encode_into(buf);
        write_uvarint(buf, self.alternative_bases.len() as u64);
        for alt in &self.alternative_bases {
            alt.encode_into(buf);
        }
    }
}
impl Decode for Variant {
    fn decode_from(reader: &mut ByteReader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            start: reader.read_i32()?,
            end: reader.read_i32()?,
            reference_name: reader.read_str()?.to_string(),
            reference_bases: Bases::decode_from(reader)?,
            alternative_bases: Vec::decode_from(reader)?,
        })
    }
}

/// Builder for [`Variant`]; all fields except the alternative bases are required.
#[derive(Debug, Default, Clone)]
pub struct VariantBuilder {
    start: Option<i32>,
    end: Option<i32>,
    reference_name: Option<String>,
    reference_bases: Option<Vec<u8>>,
    alternative_bases: Vec<Vec<u8>>,
}
impl VariantBuilder {
    #[must_use]
    pub fn start(mut self, start: i32) -> Self {
        self.start = Some(start);
        self
    }

    #[must_use]
    pub fn end(mut self, end: i32) -> Self {
        self.end = Some(end);
        self
    }

    /// Sets both start and end to the same position
    #[must_use]
    pub fn position(self, pos: i32) -> Self {
        self.start(pos).end(pos)
    }

    #[must_use]
    pub fn reference_name(mut self, name: impl Into<String>) -> Self {
        self.reference_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn reference_bases(mut self, bases: impl AsRef<[u8]>) -> Self {
        self.reference_bases = Some(bases.as_ref().to_vec());
        self
    }

    /// Appends one alternative allele, preserving call order
    #[must_use]
    pub fn alternative_base(mut self, bases: impl AsRef<[u8]>) -> Self {
        self.alternative_bases.push(bases.as_ref().to_vec());
        self
    }

    #[must_use]
    pub fn alternative_bases<I, B>(mut self, alleles: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.alternative_bases = alleles.into_iter().map(|b| b.as_ref().to_vec()).collect();
        self
    }

    pub fn build(self) -> Result<Variant> {
        let alternative_bases = self
            .alternative_bases
            .iter()
            .map(Bases::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Variant {
            start: self.start.ok_or(BuilderError::MissingField("start"))?,
            end: self.end.ok_or(BuilderError::MissingField("end"))?,
            reference_name: self
                .reference_name
                .ok_or(BuilderError::MissingField("reference_name"))?,
            reference_bases: Bases::new(
                self.reference_bases
                    .ok_or(BuilderError::MissingField("reference_bases"))?,
            )?,
            alternative_bases,
        })
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;

    fn snp() -> Variant {
        Variant::builder()
            .position(755_904)
            .reference_name("1")
            .reference_bases("G")
            .alternative_bases(["A"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let variant = snp();
        let encoded = variant.encode();
        assert_eq!(Variant::decode(&encoded)?, variant);
        Ok(())
    }

    #[test]
    fn test_field_order() {
        let encoded = snp().encode();
        // start and end are zigzag-packed 755904 (3 bytes each)
        assert_eq!(&encoded[6..8], &[1, b'1']);
        assert_eq!(&encoded[8..10], &[1, b'G']);
        assert_eq!(&encoded[10..], &[1, 1, b'A']);
    }

    #[test]
    fn test_alternative_order_matters() -> Result<()> {
        let a = Variant::builder()
            .position(10)
            .reference_name("2")
            .reference_bases("C")
            .alternative_bases(["A", "T"])
            .build()?;
        let b = Variant::builder()
            .position(10)
            .reference_name("2")
            .reference_bases("C")
            .alternative_bases(["T", "A"])
            .build()?;
        assert_ne!(a, b);
        assert_ne!(a.encode(), b.encode());
        Ok(())
    }

    #[test]
    fn test_non_ascii_bases_rejected() {
        let result = Variant::builder()
            .position(1)
            .reference_name("1")
            .reference_bases("G")
            .alternative_base("Ä")
            .build();
        assert!(matches!(
            result,
            Err(Error::BuilderError(BuilderError::NonAsciiBases(_)))
        ));
    }

    #[test]
    fn test_missing_field() {
        let result = Variant::builder().position(1).reference_bases("G").build();
        assert!(matches!(
            result,
            Err(Error::BuilderError(BuilderError::MissingField(
                "reference_name"
            )))
        ));
    }

    #[test]
    fn test_decode_rejects_non_ascii() {
        let mut encoded = snp().encode();
        let last = encoded.len() - 1;
        encoded[last] = 0xC4;
        assert_eq!(Variant::decode(&encoded), Err(CodecError::NonAsciiBases));
    }

    #[test]
    fn test_truncated_decode() {
        let encoded = snp().encode();
        for len in 0..encoded.len() {
            assert!(Variant::decode(&encoded[..len]).is_err());
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(snp().to_string(), "1:755904-755904 G>A");
    }
}
