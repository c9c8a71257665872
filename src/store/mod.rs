//! # Key-value storage
//!
//! A uniform map interface over canonically encoded keys and values, with two
//! interchangeable backends:
//!
//! 1. [`MemoryStore`] - a hash map held in process memory
//! 2. [`DiskStore`] - a pre-allocated, memory-mapped file that survives restarts
//!
//! Both backends hold entries in their canonical encoding and decode on every
//! read, so a value returned by [`KeyValueStore::get`] is always an independent
//! copy. Mutating it does not touch the store; the caller must `put` it back.
//!
//! [`AnyStore`] selects a backend at runtime for callers that do not want to be
//! generic over the store type.

mod any;
mod disk;
mod memory;

use auto_impl::auto_impl;

pub use any::{AnyStore, StoreBackend, StoreKind, STORE_EXTENSION};
pub use disk::{
    DiskStore, DiskStoreBuilder, StoreHeader, DEFAULT_DISK_CAPACITY, DEFAULT_EXPECTED_ENTRIES,
    SIZE_HEADER, STORE_MAGIC, STORE_VERSION,
};
pub use memory::MemoryStore;

use crate::Result;

/// Boxed iterator over decoded store entries
pub type EntryIter<'a, K, V> = Box<dyn Iterator<Item = Result<(K, V)>> + 'a>;

/// A map from canonically encoded keys to canonically encoded values.
///
/// Every store also carries a `high_water` mark: a single counter value that
/// identifier allocators persist next to their entries so that ids are never
/// reused when a store is reopened.
#[auto_impl(&mut, Box)]
pub trait KeyValueStore<K, V> {
    /// Returns a decoded copy of the value stored under `key`
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Stores `value` under `key`, replacing any previous value
    fn put(&mut self, key: &K, value: &V) -> Result<()>;

    fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Number of distinct keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily decodes every entry; the order is backend-specific
    fn iter(&self) -> EntryIter<'_, K, V>;

    /// Visits every entry, stopping at the first error from the store or the visitor
    fn for_each(&self, visitor: &mut dyn FnMut(K, V) -> Result<()>) -> Result<()> {
        for entry in self.iter() {
            let (key, value) = entry?;
            visitor(key, value)?;
        }
        Ok(())
    }

    fn high_water(&self) -> u64;

    fn set_high_water(&mut self, mark: u64) -> Result<()>;

    /// Makes all previous writes durable (no-op in memory)
    fn flush(&mut self) -> Result<()>;

    /// Flushes and releases the backing resource. Calling it twice is a no-op.
    fn close(&mut self) -> Result<()>;
}
