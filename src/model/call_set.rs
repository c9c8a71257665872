use std::collections::BTreeSet;

use crate::codec::{write_str, ByteReader, Decode, Encode};
use crate::error::CodecError;

/// The identity of one sample, possibly observed across several callers.
///
/// `variant_set_ids` lists every variant set the sample was called in and is
/// kept sorted, so the encoding does not depend on observation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSet {
    name: String,
    bio_sample_id: String,
    variant_set_ids: BTreeSet<i32>,
}
impl CallSet {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        bio_sample_id: impl Into<String>,
        variant_set_ids: impl IntoIterator<Item = i32>,
    ) -> Self {
        Self {
            name: name.into(),
            bio_sample_id: bio_sample_id.into(),
            variant_set_ids: variant_set_ids.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn bio_sample_id(&self) -> &str {
        &self.bio_sample_id
    }

    #[must_use]
    pub fn variant_set_ids(&self) -> &BTreeSet<i32> {
        &self.variant_set_ids
    }
}
impl Encode for CallSet {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        write_str(buf, &self.name);
        write_str(buf, &self.bio_sample_id);
        self.variant_set_ids.encode_into(buf);
    }
}
impl Decode for CallSet {
    fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            name: reader.read_str()?.to_string(),
            bio_sample_id: reader.read_str()?.to_string(),
            variant_set_ids: BTreeSet::decode_from(reader)?,
        })
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_round_trip() {
        let call_set = CallSet::new("sample123", "BS_0001", [9, 7]);
        assert_eq!(CallSet::decode(&call_set.encode()).unwrap(), call_set);
    }

    #[test]
    fn test_observation_order_does_not_matter() {
        let a = CallSet::new("sample123", "sample123", [7, 9, 7]);
        let b = CallSet::new("sample123", "sample123", [9, 7]);
        assert_eq!(a, b);
        assert_eq!(a.encode(), b.encode());
        assert_eq!(a.variant_set_ids().len(), 2);
    }
}
