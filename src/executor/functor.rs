//! Units of work run on launched threads.

use crate::error::Result;
use std::ops::{Deref, DerefMut};

/// A value exposing a single entry point, run once per execution unit.
///
/// Any `FnMut() -> Result<()>` closure is a functor. Functors launched as a
/// group are cloned, so per-replica state lives in the functor itself while
/// anything it borrows is shared between replicas and needs its own
/// synchronization.
///
/// ```
/// use tandem::{Functor, Result};
///
/// struct Sum<'a> {
///     values: &'a [u64],
///     total: u64,
/// }
///
/// impl Functor for Sum<'_> {
///     fn execute(&mut self) -> Result<()> {
///         self.total = self.values.iter().sum();
///         Ok(())
///     }
/// }
/// ```
pub trait Functor {
    fn execute(&mut self) -> Result<()>;
}

impl<F> Functor for F
where
    F: FnMut() -> Result<()>,
{
    fn execute(&mut self) -> Result<()> {
        self()
    }
}

/// One instance of a functor taking part in a launch: either the caller's
/// original or a copy owned by the launch.
#[derive(Debug)]
pub enum Replica<'a, F> {
    Borrowed(&'a mut F),
    Owned(F),
}

impl<F> Replica<'_, F> {
    pub fn is_original(&self) -> bool {
        matches!(self, Replica::Borrowed(_))
    }
}

impl<F> Deref for Replica<'_, F> {
    type Target = F;

    fn deref(&self) -> &F {
        match self {
            Replica::Borrowed(f) => f,
            Replica::Owned(f) => f,
        }
    }
}

impl<F> DerefMut for Replica<'_, F> {
    fn deref_mut(&mut self) -> &mut F {
        match self {
            Replica::Borrowed(f) => f,
            Replica::Owned(f) => f,
        }
    }
}
