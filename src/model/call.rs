use crate::codec::{write_bool, write_f64, write_str, ByteReader, Decode, Encode, Info, Value};
use crate::error::{BuilderError, CodecError, Result};

/// One sample's genotype observation at a variant.
///
/// Calls are not deduplicated on their own; many calls attach to one
/// [`Variant`](crate::Variant) through the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    variant_set_id: i32,
    call_set_id: i32,
    call_set_name: String,
    info: Info,
    genotype_likelihood: f64,
    is_genotype_phased: bool,
    non_reference_alleles: Vec<i32>,
}
impl Call {
    #[must_use]
    pub fn builder() -> CallBuilder {
        CallBuilder::default()
    }

    #[must_use]
    pub fn variant_set_id(&self) -> i32 {
        self.variant_set_id
    }

    #[must_use]
    pub fn call_set_id(&self) -> i32 {
        self.call_set_id
    }

    #[must_use]
    pub fn call_set_name(&self) -> &str {
        &self.call_set_name
    }

    #[must_use]
    pub fn info(&self) -> &Info {
        &self.info
    }

    #[must_use]
    pub fn genotype_likelihood(&self) -> f64 {
        self.genotype_likelihood
    }

    #[must_use]
    pub fn is_genotype_phased(&self) -> bool {
        self.is_genotype_phased
    }

    #[must_use]
    pub fn non_reference_alleles(&self) -> &[i32] {
        &self.non_reference_alleles
    }
}
impl Encode for Call {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.variant_set_id.encode_into(buf);
        self.call_set_id.encode_into(buf);
        write_str(buf, &self.call_set_name);
        self.info.encode_into(buf);
        write_f64(buf, self.genotype_likelihood);
        write_bool(buf, self.is_genotype_phased);
        self.non_reference_alleles.encode_into(buf);
    }
}
impl Decode for Call {
    fn decode_from(reader: &mut ByteReader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            variant_set_id: reader.read_i32()?,
            call_set_id: reader.read_i32()?,
            call_set_name: reader.read_str()?.to_string(),
            info: Info::decode_from(reader)?,
            genotype_likelihood: reader.read_f64()?,
            is_genotype_phased: reader.read_bool()?,
            non_reference_alleles: Vec::decode_from(reader)?,
        })
    }
}

/// Builder for [`Call`].
///
/// The variant-set id, call-set id and call-set name are required; the
/// remaining fields default to an empty info map, a zero likelihood, an
/// unphased genotype and no non-reference alleles.
#[derive(Debug, Default, Clone)]
pub struct CallBuilder {
    variant_set_id: Option<i32>,
    call_set_id: Option<i32>,
    call_set_name: Option<String>,
    info: Info,
    genotype_likelihood: f64,
    is_genotype_phased: bool,
    non_reference_alleles: Vec<i32>,
}
impl CallBuilder {
    #[must_use]
    pub fn variant_set_id(mut self, id: i32) -> Self {
        self.variant_set_id = Some(id);
        self
    }

    #[must_use]
    pub fn call_set_id(mut self, id: i32) -> Self {
        self.call_set_id = Some(id);
        self
    }

    #[must_use]
    pub fn call_set_name(mut self, name: impl Into<String>) -> Self {
        self.call_set_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }

    /// Inserts a single info entry, replacing any previous value under `key`
    #[must_use]
    pub fn info_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn genotype_likelihood(mut self, likelihood: f64) -> Self {
        self.genotype_likelihood = likelihood;
        self
    }

    #[must_use]
    pub fn phased(mut self, phased: bool) -> Self {
        self.is_genotype_phased = phased;
        self
    }

    #[must_use]
    pub fn non_reference_alleles(mut self, alleles: impl Into<Vec<i32>>) -> Self {
        self.non_reference_alleles = alleles.into();
        self
    }

    pub fn build(self) -> Result<Call> {
        Ok(Call {
            variant_set_id: self
                .variant_set_id
                .ok_or(BuilderError::MissingField("variant_set_id"))?,
            call_set_id: self
                .call_set_id
                .ok_or(BuilderError::MissingField("call_set_id"))?,
            call_set_name: self
                .call_set_name
                .ok_or(BuilderError::MissingField("call_set_name"))?,
            info: self.info,
            genotype_likelihood: self.genotype_likelihood,
            is_genotype_phased: self.is_genotype_phased,
            non_reference_alleles: self.non_reference_alleles,
        })
    }
}
