//! Deduplicating accumulators for call-set and variant-set identities.

use std::collections::BTreeSet;

use crate::codec::{ByteReader, Decode, Encode};
use crate::error::{CodecError, IdError, Result};
use crate::id::{IdAllocator, IdSequence, Identifier};
use crate::model::{CallSet, VariantSet};
use crate::store::{KeyValueStore, MemoryStore};

/// Accumulated state of one call-set, keyed by its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSetEntry<I> {
    id: I,
    bio_sample_id: String,
    variant_set_ids: BTreeSet<i32>,
}
impl<I: Copy> CallSetEntry<I> {
    #[must_use]
    pub fn id(&self) -> I {
        self.id
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
impl<I: Encode> Encode for CallSetEntry<I> {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.id.encode_into(buf);
        self.bio_sample_id.encode_into(buf);
        self.variant_set_ids.encode_into(buf);
    }
}
impl<I: Decode> Decode for CallSetEntry<I> {
    fn decode_from(reader: &mut ByteReader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            id: I::decode_from(reader)?,
            bio_sample_id: String::decode_from(reader)?,
            variant_set_ids: BTreeSet::decode_from(reader)?,
        })
    }
}

/// Collects, per call-set name, an id and the set of variant-sets it appears in.
///
/// Call-sets are identified by name alone. The bio-sample id is taken from the
/// first observation of a name; later observations never change it.
pub struct CallSetAccumulator<I, S = MemoryStore<String, CallSetEntry<I>>> {
    store: S,
    sequence: IdSequence<I>,
}
impl<I, S> CallSetAccumulator<I, S>
where
    I: Identifier,
    S: KeyValueStore<String, CallSetEntry<I>>,
{
    pub fn new(store: S, base: i64) -> Result<Self> {
        let sequence = IdSequence::resume(base, store.high_water())?;
        Ok(Self { store, sequence })
    }

    /// Records that `name` was seen in `variant_set_id`, using the name as bio-sample id
    pub fn add_variant_set_id(&mut self, name: &str, variant_set_id: i32) -> Result<I> {
        self.add(name, name, variant_set_id)
    }

    /// Records that `name` (sampled from `bio_sample_id`) was seen in `variant_set_id`.
    ///
    /// Returns the call-set id, assigning one on first sight.
    pub fn add(&mut self, name: &str, bio_sample_id: &str, variant_set_id: i32) -> Result<I> {
        let key = name.to_string();
        match self.store.get(&key)? {
            Some(mut entry) => {
                // unchanged sets are not written back
                if entry.variant_set_ids.insert(variant_set_id) {
                    self.store.put(&key, &entry)?;
                }
                Ok(entry.id)
            }
            None => {
                let id = self.sequence.next_id()?;
                self.store.set_high_water(self.sequence.peek())?;
                let entry = CallSetEntry {
                    id,
                    bio_sample_id: bio_sample_id.to_string(),
                    variant_set_ids: BTreeSet::from([variant_set_id]),
                };
                self.store.put(&key, &entry)?;
                Ok(id)
            }
        }
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        self.store.contains(&name.to_string())
    }

    fn entry(&self, name: &str) -> Result<CallSetEntry<I>> {
        self.store
            .get(&name.to_string())?
            .ok_or_else(|| IdError::NotFound(name.to_string()).into())
    }

    pub fn get_id(&self, name: &str) -> Result<I> {
        self.entry(name).map(|entry| entry.id)
    }

    /// Materializes the accumulated state of `name`
    pub fn build_entity(&self, name: &str) -> Result<CallSet> {
        let entry = self.entry(name)?;
        Ok(CallSet::new(
            name,
            entry.bio_sample_id,
            entry.variant_set_ids,
        ))
    }

    /// Every accumulated call-set with its id, in id order.
    ///
    /// Each call recomputes the sequence from the store.
    pub fn stream_entities(&self) -> Result<impl Iterator<Item = (I, CallSet)>> {
        let mut entities = Vec::with_capacity(self.store.len());
        self.store.for_each(&mut |name, entry| {
            entities.push((
                entry.id,
                CallSet::new(name, entry.bio_sample_id, entry.variant_set_ids),
            ));
            Ok(())
        })?;
        entities.sort_unstable_by_key(|(id, _)| *id);
        Ok(entities.into_iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}

/// Assigns ids to variant-sets, deduplicated by the full
/// `(name, data_set_id, reference_set_id)` tuple.
pub struct VariantSetAccumulator<I, S = MemoryStore<VariantSet, I>> {
    ids: IdAllocator<VariantSet, I, S>,
}
impl<I, S> VariantSetAccumulator<I, S>
where
    I: Identifier,
    S: KeyValueStore<VariantSet, I>,
{
    pub fn new(store: S, base: i64) -> Result<Self> {
        Ok(Self {
            ids: IdAllocator::new(store, base)?,
        })
    }

    /// Returns the id of `variant_set`, assigning one on first sight
    pub fn add(&mut self, variant_set: &VariantSet) -> Result<I> {
        self.ids.get_or_assign(variant_set)
    }

    pub fn contains(&self, variant_set: &VariantSet) -> Result<bool> {
        self.ids.contains(variant_set)
    }

    pub fn get_id(&self, variant_set: &VariantSet) -> Result<I> {
        self.ids.id_of(variant_set)
    }

    /// Every variant-set with its id, in id order
    pub fn stream_entities(&self) -> Result<impl Iterator<Item = (I, VariantSet)>> {
        let mut entities = self
            .ids
            .iter()
            .map(|entry| entry.map(|(variant_set, id)| (id, variant_set)))
            .collect::<Result<Vec<_>>>()?;
        entities.sort_unstable_by_key(|(id, _)| *id);
        Ok(entities.into_iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn close(&mut self) -> Result<()> {
        self.ids.close()
    }
}
