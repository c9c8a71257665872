//! Memory-mapped disk backend
//!
//! A store is one pre-allocated file, opened with a fixed capacity and mapped
//! into memory as a whole. The file never grows on its own: running out of
//! room fails the allocation with [`StorageError::CapacityExceeded`] and the
//! store has to be reopened with a larger capacity.
//!
//! ## File Structure
//!
//! ```text
//! ┌───────────────────┐
//! │   Store Header    │ 360 bytes
//! ├───────────────────┤
//! │   Bucket Table    │ 8 bytes per bucket (offset of the chain head, 0 = empty)
//! ├───────────────────┤
//! │                   │
//! │   Data Blocks     │ power-of-two sized blocks, bump allocated
//! │                   │
//! ├───────────────────┤
//! │   Unused Space    │ up to the configured capacity
//! └───────────────────┘
//! ```
//!
//! Keys are hashed over their canonical encoding into a fixed number of
//! buckets; each bucket heads a singly linked chain of blocks.
//!
//! ## Block Format
//!
//! ```text
//! [next: u64][klen: u32][vlen: u32][class: u8][pad: 7][key bytes][value bytes][slack]
//! ```
//!
//! A block of class `c` spans `2^c` bytes. A value that outgrows its block is
//! moved to a block at least twice as large and the old block is pushed onto
//! the free list of its class, where later allocations of that class reuse it.
//! All integers are little-endian. Bucket hashing uses the host byte order, so
//! store files are only portable between hosts of the same endianness.

mod header;

use std::fs::{self, File, OpenOptions};
use std::hash::Hasher;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use fs2::FileExt;
use fxhash::FxHasher64;
use log::{debug, info, warn};
use memmap2::MmapMut;

pub use header::{StoreHeader, SIZE_HEADER};

use super::{EntryIter, KeyValueStore};
use crate::codec::Codec;
use crate::error::{Result, StorageError};

/// The magic number for store files.
pub const STORE_MAGIC: &[u8; 8] = b"VIDXKVS\x01";

/// The current store format version.
pub const STORE_VERSION: u32 = 1;

/// The default pre-allocated file size (64 MiB).
pub const DEFAULT_DISK_CAPACITY: u64 = 64 * 1024 * 1024;

/// The default number of entries the bucket table is sized for.
pub const DEFAULT_EXPECTED_ENTRIES: u64 = 1 << 16;

/// Number of power-of-two block size classes tracked by the free lists
pub(crate) const NUM_SIZE_CLASSES: usize = 32;

/// Smallest block class (32 bytes)
const MIN_CLASS: u8 = 5;

/// Fixed per-block header length
const BLOCK_HEADER_LEN: usize = 24;

/// Builder for opening or creating a [`DiskStore`]
///
/// # Example
///
/// ```rust,no_run
/// use varidx::{DiskStore, Variant};
///
/// let store: DiskStore<Variant, i64> = DiskStore::<Variant, i64>::builder()
///     .capacity(256 * 1024 * 1024)
///     .expected_entries(1_000_000)
///     .open("variants.vidx")
///     .unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DiskStoreBuilder {
    capacity: u64,
    expected_entries: u64,
}
impl Default for DiskStoreBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_DISK_CAPACITY,
            expected_entries: DEFAULT_EXPECTED_ENTRIES,
        }
    }
}
impl DiskStoreBuilder {
    /// Sets the file size in bytes.
    ///
    /// For an existing store a larger capacity extends the file; a smaller
    /// one is ignored.
    #[must_use]
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sizes the bucket table of a new store; ignored when reopening
    #[must_use]
    pub fn expected_entries(mut self, entries: u64) -> Self {
        self.expected_entries = entries;
        self
    }

    fn num_buckets(&self) -> u64 {
        self.expected_entries.max(16).next_power_of_two()
    }

    /// Opens the store at `path`, creating it if the file is missing or empty
    pub fn open<K, V, P: AsRef<Path>>(self, path: P) -> Result<DiskStore<K, V>> {
        let path = path.as_ref().to_path_buf();
        let existing = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        FileExt::try_lock_exclusive(&file).map_err(|_| StorageError::Locked(path.clone()))?;

        let header = if existing == 0 {
            self.initialize(&file)?
        } else {
            self.validate(&file, &path, existing)?
        };

        // Safety: the file is exclusively locked for the lifetime of the mapping
        let mut map = unsafe { MmapMut::map_mut(&file) }?;
        map[..SIZE_HEADER].copy_from_slice(header.as_bytes());

        info!(
            "Opened store {} ({} entries, {} of {} bytes allocated)",
            path.display(),
            header.len,
            header.allocated_bytes(),
            header.capacity
        );

        Ok(DiskStore {
            path,
            inner: Some(Mapped { file, map }),
            header,
            _marker: PhantomData,
        })
    }

    fn initialize(&self, file: &File) -> Result<StoreHeader> {
        let header = StoreHeader::new(self.num_buckets(), self.capacity);
        let minimum = header.data_start + (1u64 << MIN_CLASS);
        if self.capacity < minimum {
            return Err(StorageError::CapacityTooSmall {
                capacity: self.capacity,
                minimum,
            }
            .into());
        }
        // zero-filled, so every bucket starts empty
        file.set_len(self.capacity)?;
        Ok(header)
    }

    fn validate(&self, file: &File, path: &Path, existing: u64) -> Result<StoreHeader> {
        if existing < SIZE_HEADER as u64 {
            return Err(StorageError::InvalidMagic(path.to_path_buf()).into());
        }
        let mut header = {
            // Safety: read-only view of a file we hold the exclusive lock on
            let map = unsafe { memmap2::Mmap::map(file) }?;
            StoreHeader::from_bytes(&map)
        };
        if !header.has_valid_magic() {
            return Err(StorageError::InvalidMagic(path.to_path_buf()).into());
        }
        if header.version != STORE_VERSION {
            return Err(StorageError::UnsupportedVersion(header.version).into());
        }
        if header.capacity != existing || !header.is_consistent() {
            return Err(StorageError::Corrupted(0).into());
        }
        if self.capacity > header.capacity {
            debug!(
                "Extending store {} from {} to {} bytes",
                path.display(),
                header.capacity,
                self.capacity
            );
            file.set_len(self.capacity)?;
            header.capacity = self.capacity;
        }
        Ok(header)
    }
}

struct Mapped {
    file: File,
    map: MmapMut,
}

/// Parsed fixed-length block header
#[derive(Clone, Copy, Debug)]
struct Block {
    offset: u64,
    next: u64,
    klen: usize,
    vlen: usize,
    class: u8,
}
impl Block {
    fn size(&self) -> u64 {
        1u64 << self.class
    }

    fn key_range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize + BLOCK_HEADER_LEN;
        start..start + self.klen
    }

    fn value_range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize + BLOCK_HEADER_LEN + self.klen;
        start..start + self.vlen
    }
}

/// Where a chain pointer lives: a bucket slot or the `next` field of a block
#[derive(Clone, Copy)]
enum Link {
    Bucket(u64),
    Block(u64),
}

/// Smallest size class that holds `len` bytes, or `None` past the largest class
fn size_class(len: usize) -> Option<u8> {
    let class = (len.max(1).next_power_of_two().trailing_zeros() as u8).max(MIN_CLASS);
    (usize::from(class) < NUM_SIZE_CLASSES).then_some(class)
}

fn bucket_hash(key: &[u8]) -> u64 {
    let mut hasher = FxHasher64::default();
    hasher.write(key);
    hasher.finish()
}

/// A memory-mapped [`KeyValueStore`] backed by a single pre-allocated file.
///
/// The store holds an exclusive advisory lock on its file until it is closed
/// or dropped. Dropping an open store flushes it; use [`KeyValueStore::close`]
/// to observe flush errors.
pub struct DiskStore<K, V> {
    path: PathBuf,
    inner: Option<Mapped>,
    header: StoreHeader,
    _marker: PhantomData<fn() -> (K, V)>,
}
impl<K, V> DiskStore<K, V> {
    #[must_use]
    pub fn builder() -> DiskStoreBuilder {
        DiskStoreBuilder::default()
    }

    /// Opens the store at `path` with the default capacity and bucket count
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        DiskStoreBuilder::default().open(path)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn map(&self) -> Result<&MmapMut> {
        self.inner
            .as_ref()
            .map(|m| &m.map)
            .ok_or_else(|| StorageError::Closed.into())
    }

    fn map_mut(&mut self) -> Result<&mut MmapMut> {
        self.inner
            .as_mut()
            .map(|m| &mut m.map)
            .ok_or_else(|| StorageError::Closed.into())
    }

    fn bucket_slot(&self, key: &[u8]) -> u64 {
        SIZE_HEADER as u64 + (bucket_hash(key) % self.header.num_buckets) * 8
    }

    fn read_u64(&self, offset: u64) -> Result<u64> {
        let start = offset as usize;
        Ok(LittleEndian::read_u64(&self.map()?[start..start + 8]))
    }

    fn write_u64(&mut self, offset: u64, value: u64) -> Result<()> {
        let start = offset as usize;
        LittleEndian::write_u64(&mut self.map_mut()?[start..start + 8], value);
        Ok(())
    }

    fn read_link(&self, link: Link) -> Result<u64> {
        match link {
            Link::Bucket(slot) | Link::Block(slot) => self.read_u64(slot),
        }
    }

    fn write_link(&mut self, link: Link, target: u64) -> Result<()> {
        match link {
            Link::Bucket(slot) | Link::Block(slot) => self.write_u64(slot, target),
        }
    }

    fn read_block(&self, offset: u64) -> Result<Block> {
        let header = &self.header;
        if offset < header.data_start
            || offset % 8 != 0
            || offset + BLOCK_HEADER_LEN as u64 > header.data_end
        {
            return Err(StorageError::Corrupted(offset).into());
        }
        let map = self.map()?;
        let raw = &map[offset as usize..offset as usize + BLOCK_HEADER_LEN];
        let block = Block {
            offset,
            next: LittleEndian::read_u64(&raw[0..8]),
            klen: LittleEndian::read_u32(&raw[8..12]) as usize,
            vlen: LittleEndian::read_u32(&raw[12..16]) as usize,
            class: raw[16],
        };
        if block.class < MIN_CLASS
            || usize::from(block.class) >= NUM_SIZE_CLASSES
            || offset + block.size() > header.data_end
            || (BLOCK_HEADER_LEN + block.klen + block.vlen) as u64 > block.size()
        {
            return Err(StorageError::Corrupted(offset).into());
        }
        Ok(block)
    }

    fn write_block(&mut self, block: &Block, key: &[u8], value: &[u8]) -> Result<()> {
        let start = block.offset as usize;
        let map = self.map_mut()?;
        let raw = &mut map[start..start + BLOCK_HEADER_LEN + key.len() + value.len()];
        LittleEndian::write_u64(&mut raw[0..8], block.next);
        LittleEndian::write_u32(&mut raw[8..12], key.len() as u32);
        LittleEndian::write_u32(&mut raw[12..16], value.len() as u32);
        raw[16] = block.class;
        raw[17..BLOCK_HEADER_LEN].fill(0);
        raw[BLOCK_HEADER_LEN..BLOCK_HEADER_LEN + key.len()].copy_from_slice(key);
        raw[BLOCK_HEADER_LEN + key.len()..].copy_from_slice(value);
        Ok(())
    }

    /// Finds the block holding `key` and the link that points at it
    fn find(&self, key: &[u8]) -> Result<Option<(Link, Block)>> {
        let mut link = Link::Bucket(self.bucket_slot(key));
        let mut offset = self.read_link(link)?;
        let mut steps = 0u64;
        while offset != 0 {
            let block = self.read_block(offset)?;
            if &self.map()?[block.key_range()] == key {
                return Ok(Some((link, block)));
            }
            steps += 1;
            if steps > self.header.len {
                // a chain longer than the entry count can only be a cycle
                return Err(StorageError::Corrupted(offset).into());
            }
            link = Link::Block(offset);
            offset = block.next;
        }
        Ok(None)
    }

    /// Takes a block of the given class from its free list, or from the unused tail
    fn allocate(&mut self, class: u8) -> Result<u64> {
        let size = 1u64 << class;
        let head = self.header.free_heads[usize::from(class)];
        if head != 0 {
            if !self.header.is_block_offset(head, usize::from(class)) {
                return Err(StorageError::Corrupted(head).into());
            }
            let next = self.read_u64(head)?;
            let free_bytes = self
                .header
                .free_bytes
                .checked_sub(size)
                .ok_or(StorageError::Corrupted(head))?;
            self.header.free_heads[usize::from(class)] = next;
            self.header.free_bytes = free_bytes;
            return Ok(head);
        }
        if self.header.data_end + size > self.header.capacity {
            return Err(StorageError::CapacityExceeded {
                capacity: self.header.capacity,
                requested: size,
            }
            .into());
        }
        let offset = self.header.data_end;
        self.header.data_end += size;
        Ok(offset)
    }

    fn release(&mut self, block: &Block) -> Result<()> {
        let class = usize::from(block.class);
        let head = self.header.free_heads[class];
        self.write_u64(block.offset, head)?;
        self.header.free_heads[class] = block.offset;
        self.header.free_bytes += block.size();
        Ok(())
    }

    fn sync_header(&mut self) -> Result<()> {
        let header = self.header;
        self.map_mut()?[..SIZE_HEADER].copy_from_slice(header.as_bytes());
        Ok(())
    }

    fn put_encoded(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let needed = BLOCK_HEADER_LEN + key.len() + value.len();
        let class = size_class(needed).ok_or(StorageError::RecordTooLarge(needed))?;

        match self.find(key)? {
            Some((_, block)) if needed as u64 <= block.size() => {
                let updated = Block {
                    vlen: value.len(),
                    ..block
                };
                self.write_block(&updated, key, value)?;
            }
            Some((link, block)) => {
                // grow by at least a factor of two so repeated appends stay amortised
                let class = class.max(block.class + 1);
                if usize::from(class) >= NUM_SIZE_CLASSES {
                    return Err(StorageError::RecordTooLarge(needed).into());
                }
                let moved = Block {
                    offset: self.allocate(class)?,
                    next: block.next,
                    klen: key.len(),
                    vlen: value.len(),
                    class,
                };
                self.write_block(&moved, key, value)?;
                self.write_link(link, moved.offset)?;
                self.release(&block)?;
            }
            None => {
                let slot = Link::Bucket(self.bucket_slot(key));
                let block = Block {
                    offset: self.allocate(class)?,
                    next: self.read_link(slot)?,
                    klen: key.len(),
                    vlen: value.len(),
                    class,
                };
                self.write_block(&block, key, value)?;
                self.write_link(slot, block.offset)?;
                self.header.len += 1;
            }
        }
        self.sync_header()
    }
}
impl<K: Codec, V: Codec> KeyValueStore<K, V> for DiskStore<K, V> {
    fn get(&self, key: &K) -> Result<Option<V>> {
        let key = key.encode();
        match self.find(&key)? {
            Some((_, block)) => Ok(Some(V::decode(&self.map()?[block.value_range()])?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, key: &K, value: &V) -> Result<()> {
        self.put_encoded(&key.encode(), &value.encode())
    }

    fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.find(&key.encode())?.is_some())
    }

    fn len(&self) -> usize {
        self.header.len as usize
    }

    fn iter(&self) -> EntryIter<'_, K, V> {
        Box::new(DiskIter {
            store: self,
            bucket: 0,
            next: 0,
            done: false,
        })
    }

    fn high_water(&self) -> u64 {
        self.header.high_water
    }

    fn set_high_water(&mut self, mark: u64) -> Result<()> {
        self.header.high_water = mark;
        self.sync_header()
    }

    fn flush(&mut self) -> Result<()> {
        self.sync_header()?;
        self.map()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.inner.is_none() {
            return Ok(());
        }
        self.flush()?;
        if let Some(mapped) = self.inner.take() {
            drop(mapped.map);
            FileExt::unlock(&mapped.file)?;
        }
        info!(
            "Closed store {} ({} entries)",
            self.path.display(),
            self.header.len
        );
        Ok(())
    }
}
impl<K, V> Drop for DiskStore<K, V> {
    fn drop(&mut self) {
        if let Some(mut mapped) = self.inner.take() {
            mapped.map[..SIZE_HEADER].copy_from_slice(self.header.as_bytes());
            if let Err(err) = mapped.map.flush() {
                warn!(
                    "Failed to flush store {} on drop: {err}",
                    self.path.display()
                );
            }
        }
    }
}

/// Walks the bucket table in order, following each chain
struct DiskIter<'a, K, V> {
    store: &'a DiskStore<K, V>,
    bucket: u64,
    next: u64,
    done: bool,
}
impl<K: Codec, V: Codec> DiskIter<'_, K, V> {
    fn advance(&mut self) -> Result<Option<(K, V)>> {
        while self.next == 0 {
            if self.bucket >= self.store.header.num_buckets {
                return Ok(None);
            }
            self.next = self.store.read_u64(SIZE_HEADER as u64 + self.bucket * 8)?;
            self.bucket += 1;
        }
        let block = self.store.read_block(self.next)?;
        self.next = block.next;
        let map = self.store.map()?;
        let key = K::decode(&map[block.key_range()])?;
        let value = V::decode(&map[block.value_range()])?;
        Ok(Some((key, value)))
    }
}
impl<K: Codec, V: Codec> Iterator for DiskIter<'_, K, V> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
