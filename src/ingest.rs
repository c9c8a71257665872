//! Routing of raw call records into the aggregator and accumulators.

use log::debug;

use crate::accumulate::{CallSetAccumulator, CallSetEntry, VariantSetAccumulator};
use crate::aggregate::{CallContext, VariantAggregator};
use crate::codec::Info;
use crate::error::{Error, Result};
use crate::id::Identifier;
use crate::model::{Call, Variant, VariantSet};
use crate::monitor::ThroughputCounter;
use crate::store::{AnyStore, KeyValueStore, MemoryStore, StoreBackend};

/// Store names used by [`VariantIndexer::open`]
pub const VARIANTS_STORE: &str = "variants";
pub const CALL_SETS_STORE: &str = "call_sets";
pub const VARIANT_SETS_STORE: &str = "variant_sets";

/// One sample's call at one position, as produced by a variant-file reader
#[derive(Debug, Clone, PartialEq)]
pub struct RawCall {
    pub reference_name: String,
    pub start: i32,
    pub end: i32,
    pub reference_bases: String,
    pub alternative_bases: Vec<String>,
    pub call_set_name: String,
    /// Defaults to the call-set name when absent
    pub bio_sample_id: Option<String>,
    pub variant_set: VariantSet,
    pub info: Info,
    pub genotype_likelihood: f64,
    pub is_genotype_phased: bool,
    pub non_reference_alleles: Vec<i32>,
}

/// An indexer whose stores are all chosen at runtime
pub type AnyIndexer<I> = VariantIndexer<
    I,
    AnyStore<Variant, CallContext<I>>,
    AnyStore<String, CallSetEntry<i32>>,
    AnyStore<VariantSet, i32>,
>;

/// Feeds raw calls through the variant-set accumulator, the call-set
/// accumulator and the variant aggregator, in that order.
///
/// Call-set and variant-set ids are 32-bit, matching the fields of [`Call`];
/// the variant id width `I` is free.
pub struct VariantIndexer<
    I,
    A = MemoryStore<Variant, CallContext<I>>,
    C = MemoryStore<String, CallSetEntry<i32>>,
    V = MemoryStore<VariantSet, i32>,
> {
    variants: VariantAggregator<I, A>,
    call_sets: CallSetAccumulator<i32, C>,
    variant_sets: VariantSetAccumulator<i32, V>,
}
impl<I: Identifier> VariantIndexer<I> {
    /// An indexer over fresh in-memory stores, with every counter starting at `base`
    pub fn in_memory(base: i64) -> Result<Self> {
        Ok(Self::new(
            VariantAggregator::new(MemoryStore::new(), base)?,
            CallSetAccumulator::new(MemoryStore::new(), base)?,
            VariantSetAccumulator::new(MemoryStore::new(), base)?,
        ))
    }
}
impl<I: Identifier> AnyIndexer<I> {
    /// Opens the three stores of an indexer on `backend`
    pub fn open(backend: &StoreBackend, base: i64) -> Result<Self> {
        debug!("Opening indexer stores on the {} backend", backend.kind());
        Ok(Self::new(
            VariantAggregator::new(backend.open(VARIANTS_STORE)?, base)?,
            CallSetAccumulator::new(backend.open(CALL_SETS_STORE)?, base)?,
            VariantSetAccumulator::new(backend.open(VARIANT_SETS_STORE)?, base)?,
        ))
    }
}
impl<I, A, C, V> VariantIndexer<I, A, C, V>
where
    I: Identifier,
    A: KeyValueStore<Variant, CallContext<I>>,
    C: KeyValueStore<String, CallSetEntry<i32>>,
    V: KeyValueStore<VariantSet, i32>,
{
    pub fn new(
        variants: VariantAggregator<I, A>,
        call_sets: CallSetAccumulator<i32, C>,
        variant_sets: VariantSetAccumulator<i32, V>,
    ) -> Self {
        Self {
            variants,
            call_sets,
            variant_sets,
        }
    }

    /// Bumps `counter` once per ingested call
    #[must_use]
    pub fn with_counter(mut self, counter: ThroughputCounter) -> Self {
        self.variants = self.variants.with_counter(counter);
        self
    }

    /// Ingests one record and returns the id of its variant
    pub fn ingest(&mut self, raw: RawCall) -> Result<I> {
        let variant = Variant::builder()
            .start(raw.start)
            .end(raw.end)
            .reference_name(raw.reference_name)
            .reference_bases(raw.reference_bases)
            .alternative_bases(raw.alternative_bases)
            .build()?;

        let variant_set_id = self.variant_sets.add(&raw.variant_set)?;
        let bio_sample_id = raw.bio_sample_id.as_deref().unwrap_or(&raw.call_set_name);
        let call_set_id = self
            .call_sets
            .add(&raw.call_set_name, bio_sample_id, variant_set_id)?;

        let call = Call::builder()
            .variant_set_id(variant_set_id)
            .call_set_id(call_set_id)
            .call_set_name(raw.call_set_name)
            .info(raw.info)
            .genotype_likelihood(raw.genotype_likelihood)
            .phased(raw.is_genotype_phased)
            .non_reference_alleles(raw.non_reference_alleles)
            .build()?;

        self.variants.add_call(&variant, call)
    }

    /// Ingests every record of one input, stopping at the first error.
    ///
    /// Errors from the source are wrapped in [`Error::SourceError`]; whether to
    /// continue with the next input is up to the caller. Returns the number of
    /// records ingested.
    pub fn ingest_all<R>(&mut self, records: R) -> Result<u64>
    where
        R: IntoIterator<Item = anyhow::Result<RawCall>>,
    {
        let mut ingested = 0;
        for record in records {
            let raw = record.map_err(Error::SourceError)?;
            self.ingest(raw)?;
            ingested += 1;
        }
        debug!(
            "Ingested {ingested} calls ({} variants, {} call sets, {} variant sets)",
            self.variants.len(),
            self.call_sets.len(),
            self.variant_sets.len()
        );
        Ok(ingested)
    }

    #[must_use]
    pub fn variants(&self) -> &VariantAggregator<I, A> {
        &self.variants
    }

    #[must_use]
    pub fn call_sets(&self) -> &CallSetAccumulator<i32, C> {
        &self.call_sets
    }

    #[must_use]
    pub fn variant_sets(&self) -> &VariantSetAccumulator<i32, V> {
        &self.variant_sets
    }

    /// Closes all three stores, reporting the first failure
    pub fn close(&mut self) -> Result<()> {
        let variants = self.variants.close();
        let call_sets = self.call_sets.close();
        let variant_sets = self.variant_sets.close();
        variants.and(call_sets).and(variant_sets)
    }
}
