//! The four entity kinds handled by the pipeline.
//!
//! [`Variant`] and [`Call`] are built through validating builders; the
//! smaller [`CallSet`] and [`VariantSet`] identities are plain constructors.
//! All of them are immutable once built.

mod call;
mod call_set;
mod variant;
mod variant_set;

pub use call::{Call, CallBuilder};
pub use call_set::CallSet;
pub use variant::{Bases, Variant, VariantBuilder};
pub use variant_set::VariantSet;
