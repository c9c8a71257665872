use std::fmt::Debug;
use std::marker::PhantomData;

use log::debug;

use super::{IdSequence, Identifier};
use crate::codec::Codec;
use crate::error::{IdError, Result};
use crate::store::{EntryIter, KeyValueStore, MemoryStore};

/// Allocation count between progress messages
const LOG_EVERY: u64 = 1 << 20;

/// Content-addressed interning of keys into integer ids.
///
/// The first time a key is presented it receives the next id of a
/// monotonically increasing counter; every later presentation of an equal key
/// returns that same id. Keys are compared by their canonical encoding, so
/// "equal" means structurally equal.
///
/// The counter is persisted as the store's high-water mark after every
/// allocation, so an allocator reopened over a disk store resumes past every
/// id it has handed out.
///
/// # Example
///
/// ```rust
/// use varidx::{IdAllocator, MemoryStore};
///
/// let mut ids = IdAllocator::<String, i32>::new(MemoryStore::new(), 1).unwrap();
/// assert_eq!(ids.get_or_assign(&"NA12878".to_string()).unwrap(), 1);
/// assert_eq!(ids.get_or_assign(&"NA12891".to_string()).unwrap(), 2);
/// assert_eq!(ids.get_or_assign(&"NA12878".to_string()).unwrap(), 1);
/// ```
pub struct IdAllocator<K, I, S = MemoryStore<K, I>> {
    store: S,
    sequence: IdSequence<I>,
    _marker: PhantomData<fn() -> K>,
}
impl<K, I, S> IdAllocator<K, I, S>
where
    K: Codec + Debug,
    I: Identifier,
    S: KeyValueStore<K, I>,
{
    /// Wraps `store`, starting ids at `base` or at the store's high-water mark
    pub fn new(store: S, base: i64) -> Result<Self> {
        let sequence = IdSequence::resume(base, store.high_water())?;
        Ok(Self {
            store,
            sequence,
            _marker: PhantomData,
        })
    }

    /// Returns the id of `key`, assigning the next one if it is new
    pub fn get_or_assign(&mut self, key: &K) -> Result<I> {
        if let Some(id) = self.store.get(key)? {
            return Ok(id);
        }
        let id = self.sequence.next_id()?;
        self.store.set_high_water(self.sequence.peek())?;
        self.store.put(key, &id)?;
        if id.counter() % LOG_EVERY == 0 {
            debug!("Assigned id {id} ({} keys interned)", self.store.len());
        }
        Ok(id)
    }

    pub fn contains(&self, key: &K) -> Result<bool> {
        self.store.contains(key)
    }

    /// Returns the id of a key that must already be interned
    pub fn id_of(&self, key: &K) -> Result<I> {
        self.store
            .get(key)?
            .ok_or_else(|| IdError::NotFound(format!("{key:?}")).into())
    }

    /// Number of distinct keys interned
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Every `(key, id)` pair, in backend order
    pub fn iter(&self) -> EntryIter<'_, K, I> {
        self.store.iter()
    }

    /// The counter value the next new key will receive
    #[must_use]
    pub fn next_counter(&self) -> u64 {
        self.sequence.peek()
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn into_inner(self) -> S {
        self.store
    }

    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}
