use std::error::Error as StdError;
use std::path::PathBuf;

/// Custom Result type for varidx operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the varidx library, encompassing all possible error cases
/// that can occur while encoding, storing, interning or reindexing entities.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or truncated canonical encodings
    #[error("Error decoding entity: {0}")]
    CodecError(#[from] CodecError),

    /// Errors raised by a key-value storage backend
    #[error("Error in storage backend: {0}")]
    StorageError(#[from] StorageError),

    /// Errors raised while allocating or resolving identifiers
    #[error("Error resolving identifier: {0}")]
    IdError(#[from] IdError),

    /// Errors raised when constructing entities
    #[error("Error building entity: {0}")]
    BuilderError(#[from] BuilderError),

    /// Errors raised by the reindex pipeline
    #[error("Error reindexing: {0}")]
    ReindexError(#[from] ReindexError),

    /// Errors raised by an upstream record source during ingestion
    #[error("Error reading upstream records: {0}")]
    SourceError(#[source] anyhow::Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}
impl Error {
    /// Checks if the error is a missing-key lookup
    ///
    /// Lookups that fail this way leave every store untouched, so callers that
    /// probe for membership can tell them apart from hard failures.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IdError(IdError::NotFound(_)))
    }

    /// Checks if the error means an id counter fell outside the range of its id type
    ///
    /// Covers both bounds: a negative base and a counter past the type's maximum.
    #[must_use]
    pub fn is_id_space_exhausted(&self) -> bool {
        matches!(
            self,
            Self::IdError(IdError::IdSpaceExhausted { .. } | IdError::NegativeBase(_))
        )
    }
}
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(StorageError::Io(err))
    }
}

/// Errors that can occur while decoding the canonical binary encoding
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before a field could be read
    #[error("Unexpected end of buffer: needed {needed} bytes but only {remaining} remain")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// A packed integer ran past the width of its target type
    #[error("Packed integer overflows its target width")]
    VarintOverflow,

    /// A packed integer carried redundant trailing groups
    #[error("Packed integer is not minimally encoded")]
    NonCanonicalVarint,

    /// Opaque values were nested deeper than the decoder allows
    #[error("Opaque value nesting exceeds depth {0}")]
    NestingTooDeep(usize),

    /// A length or count prefix does not fit in memory on this platform
    #[error("Length prefix ({0}) is larger than addressable memory")]
    LengthOverflow(u64),

    /// A boolean byte was neither 0 nor 1
    #[error("Invalid boolean byte: {0}")]
    InvalidBool(u8),

    /// An opaque value carried a tag outside the known set
    #[error("Unknown value tag: {0}")]
    UnknownValueTag(u8),

    /// A string field was not valid UTF-8
    #[error("String field is not valid UTF-8")]
    InvalidUtf8,

    /// A bases field contained non-ASCII bytes
    #[error("Bases field contains non-ASCII bytes")]
    NonAsciiBases,

    /// Map keys or set items were not in strictly ascending order
    #[error("Map keys or set items are out of order or repeated")]
    UnorderedKeys,

    /// Bytes were left over after a full entity was decoded
    #[error("{0} trailing bytes after a complete entity")]
    TrailingBytes(usize),
}

/// Errors raised by the key-value storage backends
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// Standard I/O errors while opening, mapping or flushing a store
    #[error("Error with IO: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the store magic number
    #[error("Invalid store magic in {0}")]
    InvalidMagic(PathBuf),

    /// The file was written by an incompatible store version
    #[error("Unsupported store version: {0}")]
    UnsupportedVersion(u32),

    /// The requested capacity cannot hold the header and bucket table
    #[error("Capacity ({capacity}) is smaller than the minimum ({minimum}) for this store")]
    CapacityTooSmall { capacity: u64, minimum: u64 },

    /// The pre-allocated file is full
    #[error(
        "Store capacity ({capacity}) exceeded while allocating {requested} bytes - reopen with a larger capacity"
    )]
    CapacityExceeded { capacity: u64, requested: u64 },

    /// A single key/value pair is larger than the biggest block the store can address
    #[error("Record of {0} bytes exceeds the largest storable block")]
    RecordTooLarge(usize),

    /// A block pointer or header inside the file is inconsistent
    #[error("Store is corrupted at offset {0}")]
    Corrupted(u64),

    /// Another handle already holds the store's exclusive lock
    #[error("Store {0} is locked by another process")]
    Locked(PathBuf),

    /// The store was used after `close()`
    #[error("Store is closed")]
    Closed,

    /// A backend name that is neither a memory nor a disk alias
    #[error("Unknown store kind: {0} (expected one of: ram, memory, mem, disk, mmap)")]
    UnknownKind(String),
}

/// Errors raised while allocating or resolving identifiers
#[derive(thiserror::Error, Debug)]
pub enum IdError {
    /// The counter would exceed the range of the id type
    ///
    /// # Fields
    /// * `next` - The counter value that could not be represented
    /// * `max` - The largest value of the configured id type
    #[error("Identifier space exhausted: next id {next} exceeds maximum {max}")]
    IdSpaceExhausted { next: u64, max: u64 },

    /// The counter base is below zero
    #[error("Identifier base must be non-negative, got {0}")]
    NegativeBase(i64),

    /// The key was never interned
    #[error("Key was never assigned an identifier: {0}")]
    NotFound(String),
}

/// Errors raised while building entities
#[derive(thiserror::Error, Debug)]
pub enum BuilderError {
    /// A required field was not set before `build()`
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A bases field contained non-ASCII characters
    #[error("Bases must be ASCII, found: {0}")]
    NonAsciiBases(String),

    /// A variant was added to the aggregator without any calls
    #[error("At least one call is required per aggregation")]
    EmptyCalls,
}

/// Errors raised by the reindex pipeline
#[derive(thiserror::Error, Debug)]
pub enum ReindexError {
    /// The paginated query surface failed
    #[error("Paginated query failed: {0}")]
    Query(#[source] anyhow::Error),

    /// Writing a nested record to the sink failed
    #[error("Failed to write nested record {key}: {source}")]
    Write {
        key: u64,
        #[source]
        source: anyhow::Error,
    },

    /// The configured page size is zero
    #[error("Page size must be greater than zero")]
    InvalidPageSize,

    /// A previous run failed and the pipeline has not been reset
    #[error("Reindex run failed after {written} records; reset before running again")]
    NeedsReset { written: u64 },
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_is_not_found() {
        let error = Error::IdError(IdError::NotFound("sample123".to_string()));
        assert!(error.is_not_found());
        assert!(!error.is_id_space_exhausted());
        assert!(format!("{error}").contains("sample123"));
    }

    #[test]
    fn test_is_id_space_exhausted() {
        let error = Error::IdError(IdError::IdSpaceExhausted {
            next: 2_147_483_648,
            max: 2_147_483_647,
        });
        assert!(error.is_id_space_exhausted());
        assert!(!error.is_not_found());

        let below = Error::IdError(IdError::NegativeBase(-1));
        assert!(below.is_id_space_exhausted());
    }

    #[test]
    fn test_codec_error_unexpected_end() {
        let error = CodecError::UnexpectedEnd {
            needed: 8,
            remaining: 3,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains('8'));
        assert!(error_str.contains('3'));
    }

    #[test]
    fn test_storage_error_capacity_exceeded() {
        let error = StorageError::CapacityExceeded {
            capacity: 4096,
            requested: 512,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("4096"));
        assert!(error_str.contains("512"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::other("disk gone");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::StorageError(StorageError::Io(_))));
    }

    #[test]
    fn test_error_from_codec_error() {
        let error: Error = CodecError::InvalidBool(7).into();
        assert!(matches!(error, Error::CodecError(CodecError::InvalidBool(7))));
    }

    #[test]
    fn test_reindex_write_error() {
        let error = ReindexError::Write {
            key: 42,
            source: anyhow::anyhow!("sink rejected"),
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("42"));
        assert!(error_str.contains("sink rejected"));
    }
}
