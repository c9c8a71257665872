use bytemuck::{Pod, Zeroable};

use super::{MIN_CLASS, NUM_SIZE_CLASSES, STORE_MAGIC, STORE_VERSION};

/// Size of the on-disk store header in bytes
pub const SIZE_HEADER: usize = size_of::<StoreHeader>();

/// The header at the start of every disk store.
///
/// This is stored identically in memory and on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct StoreHeader {
    // File Type Metadata (16 bytes)
    /// Store magic number
    magic: [u8; 8],
    /// Store format version
    pub version: u32,
    /// Reserved flags
    flags: u32,

    // Layout (24 bytes)
    /// Number of hash buckets; fixed at creation
    pub num_buckets: u64,
    /// Total mapped file size in bytes
    pub capacity: u64,
    /// Offset of the first data block (directly after the bucket table)
    pub data_start: u64,

    // Allocation state (32 bytes)
    /// Offset one past the last allocated block
    pub data_end: u64,
    /// Number of live entries
    pub len: u64,
    /// Persisted counter mark for identifier allocators
    pub high_water: u64,
    /// Bytes currently parked on the free lists
    pub free_bytes: u64,

    /// Heads of the per-size-class free lists (0 = empty)
    pub free_heads: [u64; NUM_SIZE_CLASSES],

    /// Reserved for future use
    reserved: [u8; 32],
}
impl StoreHeader {
    #[must_use]
    pub fn new(num_buckets: u64, capacity: u64) -> Self {
        let data_start = (SIZE_HEADER as u64) + num_buckets * 8;
        Self {
            magic: *STORE_MAGIC,
            version: STORE_VERSION,
            flags: 0,
            num_buckets,
            capacity,
            data_start,
            data_end: data_start,
            len: 0,
            high_water: 0,
            free_bytes: 0,
            free_heads: [0; NUM_SIZE_CLASSES],
            reserved: [0; 32],
        }
    }

    #[must_use]
    pub fn has_valid_magic(&self) -> bool {
        self.magic == *STORE_MAGIC
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reads a header from the start of `bytes`, which may be unaligned
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&bytes[..SIZE_HEADER])
    }

    /// Checks that the layout and allocation state describe a usable file.
    ///
    /// Every offset the store dereferences without further bounds checks
    /// (bucket slots, the data region, free-list heads) must lie inside
    /// `capacity`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let expected_start = self
            .num_buckets
            .checked_mul(8)
            .and_then(|table| table.checked_add(SIZE_HEADER as u64));
        if self.num_buckets == 0
            || expected_start != Some(self.data_start)
            || self.data_start > self.data_end
            || self.data_end > self.capacity
            || self.free_bytes > self.data_end - self.data_start
        {
            return false;
        }
        self.free_heads.iter().enumerate().all(|(class, &head)| {
            head == 0 || (class >= usize::from(MIN_CLASS) && self.is_block_offset(head, class))
        })
    }

    /// Whether a block of class `class` at `offset` lies inside the data region
    #[must_use]
    pub fn is_block_offset(&self, offset: u64, class: usize) -> bool {
        offset >= self.data_start
            && offset % 8 == 0
            && offset
                .checked_add(1u64 << class)
                .is_some_and(|end| end <= self.data_end)
    }

    /// Bytes of the data region handed out to blocks, live or free
    #[must_use]
    pub fn allocated_bytes(&self) -> u64 {
        self.data_end - self.data_start
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_header_size_is_stable() {
        assert_eq!(SIZE_HEADER, 360);
        assert_eq!(SIZE_HEADER % 8, 0);
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut header = StoreHeader::new(1024, 1 << 20);
        header.len = 3;
        header.free_heads[7] = 4096;
        let bytes = header.as_bytes().to_vec();
        let parsed = StoreHeader::from_bytes(&bytes);
        assert_eq!(parsed, header);
        assert!(parsed.has_valid_magic());
        assert_eq!(parsed.data_start, 360 + 1024 * 8);
    }

    #[test]
    fn test_fresh_header_is_consistent() {
        assert!(StoreHeader::new(16, 1 << 20).is_consistent());
    }

    #[test]
    fn test_inconsistent_layouts() {
        let fresh = StoreHeader::new(16, 1 << 20);

        let mut header = fresh;
        header.num_buckets = 0;
        assert!(!header.is_consistent());

        let mut header = fresh;
        header.data_start += 8;
        assert!(!header.is_consistent());

        let mut header = fresh;
        header.data_end = header.data_start - 8;
        assert!(!header.is_consistent());

        let mut header = fresh;
        header.data_end = header.capacity + 1;
        assert!(!header.is_consistent());

        let mut header = fresh;
        header.num_buckets = u64::MAX;
        assert!(!header.is_consistent());

        let mut header = fresh;
        header.free_bytes = 64;
        assert!(!header.is_consistent());
    }

    #[test]
    fn test_free_heads_must_point_into_data() {
        let mut header = StoreHeader::new(16, 1 << 20);
        let start = header.data_start;
        header.data_end = start + 256;
        header.free_bytes = 64;

        header.free_heads[6] = start + 64;
        assert!(header.is_consistent());

        // past the allocated region
        header.free_heads[6] = start + 224;
        assert!(!header.is_consistent());

        // inside the bucket table
        header.free_heads[6] = 8;
        assert!(!header.is_consistent());

        // misaligned
        header.free_heads[6] = start + 3;
        assert!(!header.is_consistent());

        // below the smallest class
        header.free_heads[6] = 0;
        header.free_heads[2] = start;
        assert!(!header.is_consistent());
    }
}
