use std::marker::PhantomData;

use super::Identifier;
use crate::error::{IdError, Result};

/// A monotonically increasing id counter.
///
/// The counter only moves forward: each call to [`IdSequence::next_id`]
/// returns the current value and advances by one. Once the counter passes
/// the range of `I` every further allocation fails with
/// [`IdError::IdSpaceExhausted`]; the sequence never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSequence<I> {
    next: u64,
    _marker: PhantomData<fn() -> I>,
}
impl<I: Identifier> IdSequence<I> {
    /// Starts a sequence whose first id is `base`
    ///
    /// A negative `base` fails with [`IdError::NegativeBase`] and one past the
    /// width of `I` with [`IdError::IdSpaceExhausted`]. Both count as id-space
    /// errors under [`Error::is_id_space_exhausted`](crate::Error::is_id_space_exhausted).
    pub fn new(base: i64) -> Result<Self> {
        let Ok(next) = u64::try_from(base) else {
            return Err(IdError::NegativeBase(base).into());
        };
        if next > I::MAX {
            return Err(IdError::IdSpaceExhausted { next, max: I::MAX }.into());
        }
        Ok(Self {
            next,
            _marker: PhantomData,
        })
    }

    /// Starts a sequence at `base`, or past `high_water` if a previous run got further
    pub fn resume(base: i64, high_water: u64) -> Result<Self> {
        let mut sequence = Self::new(base)?;
        sequence.next = sequence.next.max(high_water);
        Ok(sequence)
    }

    /// The counter value the next allocation will use
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Takes the next id
    pub fn next_id(&mut self) -> Result<I> {
        let id = I::from_counter(self.next)?;
        self.next += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;

    #[test]
    fn test_counts_up_from_base() -> Result<()> {
        let mut sequence = IdSequence::<i32>::new(1)?;
        assert_eq!(sequence.next_id()?, 1);
        assert_eq!(sequence.next_id()?, 2);
        assert_eq!(sequence.peek(), 3);
        Ok(())
    }

    #[test]
    fn test_rejects_negative_base() {
        assert!(matches!(
            IdSequence::<i64>::new(-1),
            Err(Error::IdError(IdError::NegativeBase(-1)))
        ));
        assert!(IdSequence::<i32>::new(i64::MIN).is_err_and(|e| e.is_id_space_exhausted()));
    }

    #[test]
    fn test_rejects_base_past_width() {
        let result = IdSequence::<i32>::new(i64::from(i32::MAX) + 1);
        assert!(result.is_err_and(|e| e.is_id_space_exhausted()));
    }

    #[test]
    fn test_exhausts_without_wrapping() -> Result<()> {
        let mut sequence = IdSequence::<i32>::new(i64::from(i32::MAX) - 1)?;
        assert_eq!(sequence.next_id()?, i32::MAX - 1);
        assert_eq!(sequence.next_id()?, i32::MAX);
        assert!(sequence.next_id().is_err_and(|e| e.is_id_space_exhausted()));
        // a failed allocation does not consume anything
        assert!(sequence.next_id().is_err());
        Ok(())
    }

    #[test]
    fn test_resume_never_goes_backwards() -> Result<()> {
        assert_eq!(IdSequence::<i64>::resume(0, 42)?.peek(), 42);
        assert_eq!(IdSequence::<i64>::resume(100, 42)?.peek(), 100);
        Ok(())
    }
}
