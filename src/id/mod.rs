//! Identifier allocation.
//!
//! [`IdAllocator`] interns keys into ids drawn from an [`IdSequence`];
//! [`IdentifierContext`] pairs an id with an append-only collection.

mod allocator;
mod context;
mod identifier;
mod sequence;

pub use allocator::IdAllocator;
pub use context::IdentifierContext;
pub use identifier::Identifier;
pub use sequence::IdSequence;
