use crate::codec::{write_str, ByteReader, Decode, Encode};
use crate::error::CodecError;

/// The identity of one calling workflow run against a reference.
///
/// Deduplicated by the full `(name, data_set_id, reference_set_id)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantSet {
    name: String,
    data_set_id: String,
    reference_set_id: String,
}
impl VariantSet {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data_set_id: impl Into<String>,
        reference_set_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_set_id: data_set_id.into(),
            reference_set_id: reference_set_id.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data_set_id(&self) -> &str {
        &self.data_set_id
    }

    #[must_use]
    pub fn reference_set_id(&self) -> &str {
        &self.reference_set_id
    }
}
impl Encode for VariantSet {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_str(buf, &self.name);
        write_str(buf, &self.data_set_id);
        write_str(buf, &self.reference_set_id);
    }
}
impl Decode for VariantSet {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            name: reader.read_str()?.to_string(),
            data_set_id: reader.read_str()?.to_string(),
            reference_set_id: reader.read_str()?.to_string(),
        })
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_round_trip() {
        let variant_set = VariantSet::new("freebayes", "1kg", "GRCh37");
        let encoded = variant_set.encode();
        assert_eq!(encoded[0], 9);
        assert_eq!(VariantSet::decode(&encoded).unwrap(), variant_set);
    }

    #[test]
    fn test_tuple_identity() {
        let a = VariantSet::new("freebayes", "1kg", "GRCh37");
        let b = VariantSet::new("freebayes", "1kg", "GRCh38");
        assert_ne!(a, b);
        assert_ne!(a.encode(), b.encode());
    }
}
