use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;

use super::{
    DiskStore, DiskStoreBuilder, EntryIter, KeyValueStore, MemoryStore, DEFAULT_DISK_CAPACITY,
    DEFAULT_EXPECTED_ENTRIES,
};
use crate::codec::Codec;
use crate::error::{Error, Result, StorageError};

/// File extension used for store files created by [`StoreBackend::open`]
pub const STORE_EXTENSION: &str = "vidx";

/// The two storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Disk,
}
impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ram" | "memory" | "mem" => Ok(Self::Memory),
            "disk" | "mmap" => Ok(Self::Disk),
            _ => Err(StorageError::UnknownKind(s.to_string()).into()),
        }
    }
}
impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk"),
        }
    }
}

/// Runtime backend selection shared by every store of one pipeline run.
///
/// A disk backend places each named store at `<dir>/<name>.vidx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Disk {
        dir: PathBuf,
        capacity: u64,
        expected_entries: u64,
    },
}
impl Default for StoreBackend {
    fn default() -> Self {
        Self::Memory
    }
}
impl StoreBackend {
    /// A disk backend rooted at `dir` with default sizing
    pub fn disk<P: AsRef<Path>>(dir: P) -> Self {
        Self::Disk {
            dir: dir.as_ref().to_path_buf(),
            capacity: DEFAULT_DISK_CAPACITY,
            expected_entries: DEFAULT_EXPECTED_ENTRIES,
        }
    }

    #[must_use]
    pub fn kind(&self) -> StoreKind {
        match self {
            Self::Memory => StoreKind::Memory,
            Self::Disk { .. } => StoreKind::Disk,
        }
    }

    /// Sets the file capacity of a disk backend; ignored in memory
    #[must_use]
    pub fn capacity(mut self, bytes: u64) -> Self {
        if let Self::Disk { capacity, .. } = &mut self {
            *capacity = bytes;
        }
        self
    }

    /// Sets the bucket sizing of a disk backend; ignored in memory
    #[must_use]
    pub fn expected_entries(mut self, entries: u64) -> Self {
        if let Self::Disk {
            expected_entries, ..
        } = &mut self
        {
            *expected_entries = entries;
        }
        self
    }

    /// Path of the store file for `name`, if this is a disk backend
    #[must_use]
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        match self {
            Self::Memory => None,
            Self::Disk { dir, .. } => Some(dir.join(format!("{name}.{STORE_EXTENSION}"))),
        }
    }

    /// Opens (or creates) the store called `name` on this backend
    pub fn open<K, V>(&self, name: &str) -> Result<AnyStore<K, V>> {
        match self {
            Self::Memory => Ok(AnyStore::Memory(MemoryStore::new())),
            Self::Disk {
                dir,
                capacity,
                expected_entries,
            } => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("{name}.{STORE_EXTENSION}"));
                debug!("Opening disk store {name} at {}", path.display());
                let store = DiskStoreBuilder::default()
                    .capacity(*capacity)
                    .expected_entries(*expected_entries)
                    .open(path)?;
                Ok(AnyStore::Disk(store))
            }
        }
    }
}

/// A store whose backend is chosen at runtime
pub enum AnyStore<K, V> {
    Memory(MemoryStore<K, V>),
    Disk(DiskStore<K, V>),
}
impl<K, V> AnyStore<K, V> {
    #[must_use]
    pub fn kind(&self) -> StoreKind {
        match self {
            Self::Memory(_) => StoreKind::Memory,
            Self::Disk(_) => StoreKind::Disk,
        }
    }
}
impl<K, V> From<MemoryStore<K, V>> for AnyStore<K, V> {
    fn from(store: MemoryStore<K, V>) -> Self {
        Self::Memory(store)
    }
}
impl<K, V> From<DiskStore<K, V>> for AnyStore<K, V> {
    fn from(store: DiskStore<K, V>) -> Self {
        Self::Disk(store)
    }
}
impl<K: Codec, V: Codec> KeyValueStore<K, V> for AnyStore<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>> {
        match self {
            Self::Memory(store) => store.get(key),
            Self::Disk(store) => store.get(key),
        }
    }

    fn put(&mut self, key: &K, value: &V) -> Result<()> {
        match self {
            Self::Memory(store) => store.put(key, value),
            Self::Disk(store) => store.put(key, value),
        }
    }

    fn contains(&self, key: &K) -> Result<bool> {
        match self {
            Self::Memory(store) => store.contains(key),
            Self::Disk(store) => store.contains(key),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Memory(store) => store.len(),
            Self::Disk(store) => store.len(),
        }
    }

    fn iter(&self) -> EntryIter<'_, K, V> {
        match self {
            Self::Memory(store) => store.iter(),
            Self::Disk(store) => store.iter(),
        }
    }

    fn high_water(&self) -> u64 {
        match self {
            Self::Memory(store) => store.high_water(),
            Self::Disk(store) => store.high_water(),
        }
    }

    fn set_high_water(&mut self, mark: u64) -> Result<()> {
        match self {
            Self::Memory(store) => store.set_high_water(mark),
            Self::Disk(store) => store.set_high_water(mark),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            Self::Memory(store) => store.flush(),
            Self::Disk(store) => store.flush(),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self {
            Self::Memory(store) => store.close(),
            Self::Disk(store) => store.close(),
        }
    }
}
