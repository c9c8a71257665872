use std::marker::PhantomData;

use fxhash::FxHashMap;

use super::{EntryIter, KeyValueStore};
use crate::codec::Codec;
use crate::Result;

/// An in-memory [`KeyValueStore`].
///
/// Entries are held in their canonical encoding, which keeps allele-heavy keys
/// compact and makes this backend observably identical to the disk backend.
/// Nothing survives the process and `close()` does nothing.
pub struct MemoryStore<K, V> {
    entries: FxHashMap<Box<[u8]>, Box<[u8]>>,
    high_water: u64,
    _marker: PhantomData<fn() -> (K, V)>,
}
impl<K, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            high_water: 0,
            _marker: PhantomData,
        }
    }
}
impl<K, V> MemoryStore<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            ..Self::default()
        }
    }

    /// Total size of the encoded keys and values in bytes
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}
impl<K: Codec, V: Codec> KeyValueStore<K, V> for MemoryStore<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>> {
        match self.entries.get(key.encode().as_slice()) {
            Some(bytes) => Ok(Some(V::decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, key: &K, value: &V) -> Result<()> {
        self.entries.insert(
            key.encode().into_boxed_slice(),
            value.encode().into_boxed_slice(),
        );
        Ok(())
    }

    fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.entries.contains_key(key.encode().as_slice()))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn iter(&self) -> EntryIter<'_, K, V> {
        Box::new(
            self.entries
                .iter()
                .map(|(k, v)| -> Result<(K, V)> { Ok((K::decode(k)?, V::decode(v)?)) }),
        )
    }

    fn high_water(&self) -> u64 {
        self.high_water
    }

    fn set_high_water(&mut self, mark: u64) -> Result<()> {
        self.high_water = mark;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_put_get() -> Result<()> {
        let mut store = MemoryStore::<String, i64>::new();
        assert!(store.is_empty());
        store.put(&"chr1".to_string(), &7)?;
        assert_eq!(store.get(&"chr1".to_string())?, Some(7));
        assert_eq!(store.get(&"chr2".to_string())?, None);
        assert!(store.contains(&"chr1".to_string())?);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn test_put_replaces() -> Result<()> {
        let mut store = MemoryStore::<String, Vec<i32>>::new();
        let key = "sample".to_string();
        store.put(&key, &vec![1])?;
        store.put(&key, &vec![1, 2])?;
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key)?, Some(vec![1, 2]));
        Ok(())
    }

    #[test]
    fn test_get_returns_a_copy() -> Result<()> {
        let mut store = MemoryStore::<String, Vec<i32>>::new();
        let key = "sample".to_string();
        store.put(&key, &vec![1])?;

        let mut copy = store.get(&key)?.unwrap_or_default();
        copy.push(2);
        assert_eq!(store.get(&key)?, Some(vec![1]));
        Ok(())
    }

    #[test]
    fn test_for_each_visits_everything() -> Result<()> {
        let mut store = MemoryStore::<i64, i64>::new();
        for i in 0..100 {
            store.put(&i, &(i * 2))?;
        }
        let mut total = 0;
        store.for_each(&mut |k, v| {
            assert_eq!(v, k * 2);
            total += 1;
            Ok(())
        })?;
        assert_eq!(total, 100);
        Ok(())
    }

    #[test]
    fn test_close_is_a_no_op() -> Result<()> {
        let mut store = MemoryStore::<i64, i64>::new();
        store.put(&1, &1)?;
        store.close()?;
        store.close()?;
        assert_eq!(store.get(&1)?, Some(1));
        Ok(())
    }
}
