//! The three kinds of pipeline stage and the loops that drive them.

use super::handoff::{Reader, Writer};
use crate::error::Result;

/// First stage of a pipeline: fills item slots.
///
/// `fill` receives a slot (a clone of the prototype or a recycled item, which
/// still holds its previous contents) and returns `Ok(false)` once there is
/// nothing left to produce; the slot is not sent in that case.
pub trait Source<T> {
    fn fill(&mut self, item: &mut T) -> Result<bool>;
}

/// Intermediate stage: turns each input item into an output item.
///
/// Returning `Ok(false)` discards `output` instead of forwarding it.
pub trait Pipe<I, O> {
    fn process(&mut self, input: &I, output: &mut O) -> Result<bool>;
}

/// Final stage: consumes items.
///
/// Returning `Ok(false)` stops this replica; once every replica of the sink
/// has stopped, upstream stages stop as well.
pub trait Sink<T> {
    fn consume(&mut self, item: &T) -> Result<bool>;
}

impl<T, F> Source<T> for F
where
    F: FnMut(&mut T) -> Result<bool>,
{
    fn fill(&mut self, item: &mut T) -> Result<bool> {
        self(item)
    }
}

impl<I, O, F> Pipe<I, O> for F
where
    F: FnMut(&I, &mut O) -> Result<bool>,
{
    fn process(&mut self, input: &I, output: &mut O) -> Result<bool> {
        self(input, output)
    }
}

impl<T, F> Sink<T> for F
where
    F: FnMut(&T) -> Result<bool>,
{
    fn consume(&mut self, item: &T) -> Result<bool> {
        self(item)
    }
}

pub(crate) fn drive_source<S, T>(source: &mut S, output: &Writer<T>) -> Result<()>
where
    S: Source<T> + ?Sized,
    T: Clone,
{
    loop {
        let mut item = output.slot();
        if !source.fill(&mut item)? {
            output.recycle(item);
            return Ok(());
        }
        if !output.write(item) {
            return Ok(());
        }
    }
}

pub(crate) fn drive_pipe<P, I, O>(pipe: &mut P, input: &Reader<I>, output: &Writer<O>) -> Result<()>
where
    P: Pipe<I, O> + ?Sized,
    O: Clone,
{
    while let Some(item) = input.read() {
        let mut product = output.slot();
        let forward = pipe.process(&item, &mut product)?;
        input.recycle(item);

        if !forward {
            output.recycle(product);
        } else if !output.write(product) {
            break;
        }
    }
    Ok(())
}

pub(crate) fn drive_sink<K, T>(sink: &mut K, input: &Reader<T>) -> Result<()>
where
    K: Sink<T> + ?Sized,
{
    while let Some(item) = input.read() {
        let more = sink.consume(&item)?;
        input.recycle(item);
        if !more {
            break;
        }
    }
    Ok(())
}
