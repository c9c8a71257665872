//! Per-variant aggregation of calls.
//!
//! Every distinct [`Variant`] gets one id and one [`IdentifierContext`]
//! collecting all of its calls across input files. Stores hand out decoded
//! copies, so every append is a fetch, a local mutation and a write back.

use log::debug;

use crate::error::{BuilderError, IdError, Result};
use crate::id::{IdSequence, Identifier, IdentifierContext};
use crate::model::{Call, Variant};
use crate::monitor::ThroughputCounter;
use crate::store::{EntryIter, KeyValueStore, MemoryStore};

/// The value stored per variant: its id and every call observed for it
pub type CallContext<I> = IdentifierContext<I, Call>;

/// Interns variants and appends their calls.
///
/// Ids come from a single counter starting at `base` and are persisted as the
/// store's high-water mark, exactly like [`IdAllocator`](crate::IdAllocator).
pub struct VariantAggregator<I, S = MemoryStore<Variant, CallContext<I>>> {
    store: S,
    sequence: IdSequence<I>,
    counter: Option<ThroughputCounter>,
}
impl<I, S> VariantAggregator<I, S>
where
    I: Identifier,
    S: KeyValueStore<Variant, CallContext<I>>,
{
    pub fn new(store: S, base: i64) -> Result<Self> {
        let sequence = IdSequence::resume(base, store.high_water())?;
        Ok(Self {
            store,
            sequence,
            counter: None,
        })
    }

    /// Bumps `counter` once for every call added
    #[must_use]
    pub fn with_counter(mut self, counter: ThroughputCounter) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Appends `calls` to the context of `variant`, creating it on first sight.
    ///
    /// Returns the variant's id. At least one call is required.
    pub fn add(&mut self, variant: &Variant, calls: Vec<Call>) -> Result<I> {
        if calls.is_empty() {
            return Err(BuilderError::EmptyCalls.into());
        }
        let added = calls.len() as u64;

        let id = match self.store.get(variant)? {
            Some(mut context) => {
                context.extend(calls);
                self.store.put(variant, &context)?;
                context.id()
            }
            None => {
                let id = self.sequence.next_id()?;
                self.store.set_high_water(self.sequence.peek())?;
                self.store
                    .put(variant, &CallContext::with_items(id, calls))?;
                if self.store.len() % (1 << 20) == 0 {
                    debug!("Aggregated {} distinct variants", self.store.len());
                }
                id
            }
        };

        if let Some(counter) = &self.counter {
            counter.add(added);
        }
        Ok(id)
    }

    /// Appends a single call
    pub fn add_call(&mut self, variant: &Variant, call: Call) -> Result<I> {
        self.add(variant, vec![call])
    }

    /// Returns a copy of the context stored for `variant`
    pub fn get(&self, variant: &Variant) -> Result<Option<CallContext<I>>> {
        self.store.get(variant)
    }

    pub fn id_of(&self, variant: &Variant) -> Result<I> {
        match self.store.get(variant)? {
            Some(context) => Ok(context.id()),
            None => Err(IdError::NotFound(variant.to_string()).into()),
        }
    }

    /// Lazily yields every variant with its context, in backend order
    pub fn stream_all(&self) -> EntryIter<'_, Variant, CallContext<I>> {
        self.store.iter()
    }

    /// Number of distinct variants
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn into_inner(self) -> S {
        self.store
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::store::DiskStore;
    use crate::Error;

    fn snp() -> Result<Variant> {
        Variant::builder()
            .position(755_904)
            .reference_name("1")
            .reference_bases("G")
            .alternative_base("A")
            .build()
    }

    fn call(call_set_id: i32, name: &str) -> Result<Call> {
        Call::builder()
            .variant_set_id(1)
            .call_set_id(call_set_id)
            .call_set_name(name)
            .genotype_likelihood(-0.5)
            .non_reference_alleles([1, 0])
            .build()
    }

    #[test]
    fn test_three_calls_for_one_variant() -> Result<()> {
        let mut aggregator = VariantAggregator::<i64>::new(MemoryStore::new(), 0)?;
        let variant = snp()?;
        let calls = [call(1, "HG00096")?, call(2, "HG00097")?, call(3, "HG00099")?];
        let ids = calls
            .iter()
            .map(|c| aggregator.add_call(&variant, c.clone()))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(ids, vec![0, 0, 0]);
        assert_eq!(aggregator.len(), 1);

        let context = aggregator.get(&variant)?.unwrap_or_else(|| panic!("missing"));
        assert_eq!(context.id(), 0);
        assert_eq!(context.items(), &calls);
        Ok(())
    }

    #[test]
    fn test_empty_calls_rejected() -> Result<()> {
        let mut aggregator = VariantAggregator::<i32>::new(MemoryStore::new(), 0)?;
        let result = aggregator.add(&snp()?, Vec::new());
        assert!(matches!(
            result,
            Err(Error::BuilderError(BuilderError::EmptyCalls))
        ));
        assert!(aggregator.is_empty());
        Ok(())
    }

    #[test]
    fn test_counter_counts_calls() -> Result<()> {
        let counter = ThroughputCounter::new();
        let mut aggregator =
            VariantAggregator::<i32>::new(MemoryStore::new(), 1)?.with_counter(counter.clone());
        aggregator.add(&snp()?, vec![call(1, "a")?, call(2, "b")?])?;
        aggregator.add_call(&snp()?, call(3, "c")?)?;
        assert_eq!(counter.get(), 3);
        Ok(())
    }

    #[test]
    fn test_id_of() -> Result<()> {
        let mut aggregator = VariantAggregator::<i32>::new(MemoryStore::new(), 10)?;
        let variant = snp()?;
        assert!(aggregator.id_of(&variant).is_err_and(|e| e.is_not_found()));
        aggregator.add_call(&variant, call(1, "a")?)?;
        assert_eq!(aggregator.id_of(&variant)?, 10);
        Ok(())
    }

    #[test]
    fn test_disk_appends_are_written_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("variants.vidx");
        let builder = DiskStore::<Variant, CallContext<i64>>::builder()
            .capacity(1 << 20)
            .expected_entries(64);
        let variant = snp()?;
        {
            let mut aggregator: VariantAggregator<i64, DiskStore<_, _>> =
                VariantAggregator::new(builder.open(&path)?, 0)?;
            for i in 0..50 {
                aggregator.add_call(&variant, call(i, &format!("sample{i}"))?)?;
            }
            aggregator.close()?;
        }
        let aggregator: VariantAggregator<i64, DiskStore<_, _>> =
            VariantAggregator::new(builder.open(&path)?, 0)?;
        let context = aggregator.get(&variant)?.unwrap_or_else(|| panic!("missing"));
        assert_eq!(context.len(), 50);
        assert_eq!(context.items()[49].call_set_name(), "sample49");
        Ok(())
    }

    #[test]
    fn test_stream_all() -> Result<()> {
        let mut aggregator = VariantAggregator::<i32>::new(MemoryStore::new(), 0)?;
        for pos in 0..10 {
            let variant = Variant::builder()
                .position(pos)
                .reference_name("2")
                .reference_bases("C")
                .alternative_base("T")
                .build()?;
            aggregator.add_call(&variant, call(1, "a")?)?;
        }
        let mut ids = aggregator
            .stream_all()
            .map(|entry| entry.map(|(variant, context)| (variant.start(), context.id())))
            .collect::<Result<Vec<_>>>()?;
        ids.sort_unstable();
        assert_eq!(ids, (0..10).map(|i| (i, i)).collect::<Vec<_>>());
        Ok(())
    }
}
