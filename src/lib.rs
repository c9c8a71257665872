//! # varidx
//!
//! The ingestion and deduplication core of a genomic-variant indexing pipeline.
//!
//! Streams of per-sample variant calls are reduced to:
//!
//! 1. stable, monotonically increasing integer ids for every distinct
//!    [`Variant`], [`CallSet`] and [`VariantSet`], deduplicated by structural
//!    equality, and
//! 2. one aggregated collection of [`Call`]s per variant.
//!
//! The working set rarely fits in memory, so every component sits on a
//! [`KeyValueStore`] that is either a [`MemoryStore`] or a memory-mapped
//! [`DiskStore`]; the algorithms do not change between the two.
//!
//! ## Example
//!
//! ```rust
//! use varidx::{RawCall, VariantIndexer, VariantSet};
//!
//! let mut indexer = VariantIndexer::<i64>::in_memory(0).unwrap();
//! let record = RawCall {
//!     reference_name: "1".to_string(),
//!     start: 755_904,
//!     end: 755_904,
//!     reference_bases: "G".to_string(),
//!     alternative_bases: vec!["A".to_string()],
//!     call_set_name: "HG00096".to_string(),
//!     bio_sample_id: None,
//!     variant_set: VariantSet::new("phase3", "1kg", "GRCh37"),
//!     info: Default::default(),
//!     genotype_likelihood: 0.0,
//!     is_genotype_phased: false,
//!     non_reference_alleles: vec![1],
//! };
//! let id = indexer.ingest(record).unwrap();
//! assert_eq!(id, 0);
//! ```
//!
//! ## Modules
//!
//! * [`codec`] - canonical byte encoding shared by every store
//! * [`store`] - the storage abstraction and its backends
//! * [`reindex`] - scroll-driven parent/child to nested document rewriting

pub mod codec;
pub mod reindex;
pub mod store;

mod accumulate;
mod aggregate;
mod error;
mod id;
mod ingest;
mod model;
mod monitor;

pub use accumulate::{CallSetAccumulator, CallSetEntry, VariantSetAccumulator};
pub use aggregate::{CallContext, VariantAggregator};
pub use codec::{Codec, Decode, Encode, Info, Value};
pub use error::{
    BuilderError, CodecError, Error, IdError, ReindexError, Result, StorageError,
};
pub use id::{IdAllocator, IdSequence, Identifier, IdentifierContext};
pub use ingest::{
    AnyIndexer, RawCall, VariantIndexer, CALL_SETS_STORE, VARIANTS_STORE, VARIANT_SETS_STORE,
};
pub use model::{Bases, Call, CallBuilder, CallSet, Variant, VariantBuilder, VariantSet};
pub use monitor::{
    ThroughputCounter, ThroughputMonitor, ThroughputReport, DEFAULT_REPORT_INTERVAL,
};
pub use reindex::{
    DocumentSink, ReindexConfig, ReindexPipeline, ReindexSummary, ScrollSource, ScrollState,
    DEFAULT_PAGE_SIZE,
};
pub use store::{
    AnyStore, DiskStore, DiskStoreBuilder, KeyValueStore, MemoryStore, StoreBackend, StoreKind,
    DEFAULT_DISK_CAPACITY, DEFAULT_EXPECTED_ENTRIES,
};
