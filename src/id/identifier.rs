use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::codec::Codec;
use crate::error::{IdError, Result};

/// An integer id type handed out by an [`IdSequence`](super::IdSequence).
///
/// The width is chosen once, as a type parameter, so a 32-bit deployment
/// never pays for 64-bit ids and vice versa. Ids are always non-negative;
/// the counter behind them is a `u64` that must fit within [`Identifier::MAX`].
pub trait Identifier:
    Copy + Eq + Ord + Hash + Debug + Display + Codec + Send + Sync + 'static
{
    /// Largest counter value representable by this id type
    const MAX: u64;

    /// Converts a counter value into an id, failing past [`Identifier::MAX`]
    fn from_counter(counter: u64) -> Result<Self>;

    /// Returns the counter value behind this id
    fn counter(self) -> u64;
}

impl Identifier for i32 {
    const MAX: u64 = i32::MAX as u64;

    fn from_counter(counter: u64) -> Result<Self> {
        i32::try_from(counter).map_err(|_| {
            IdError::IdSpaceExhausted {
                next: counter,
                max: <Self as Identifier>::MAX,
            }
            .into()
        })
    }

    fn counter(self) -> u64 {
        u64::from(self.unsigned_abs())
    }
}

impl Identifier for i64 {
    const MAX: u64 = i64::MAX as u64;

    fn from_counter(counter: u64) -> Result<Self> {
        i64::try_from(counter).map_err(|_| {
            IdError::IdSpaceExhausted {
                next: counter,
                max: <Self as Identifier>::MAX,
            }
            .into()
        })
    }

    fn counter(self) -> u64 {
        self.unsigned_abs()
    }
}
