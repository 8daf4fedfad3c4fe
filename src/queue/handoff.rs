//! Bounded hand-off between two adjacent pipeline stages.
//!
//! Items travel over a bounded channel; consumed items travel back over a
//! free pool so that writers refill existing slots instead of cloning the
//! prototype again. The channel disconnects when the last writer (or the
//! last reader) endpoint is dropped, which is how end-of-stream and early
//! termination propagate between stages.

use super::stats::HandoffCounters;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stop signal shared by every endpoint of one pipeline.
///
/// Cancelling drops the only sender of `signal`, which wakes every endpoint
/// blocked in a `select!` on it.
#[derive(Debug)]
pub(crate) struct CancelToken {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            signal,
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.trigger.lock().take();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub(crate) struct Handoff<T> {
    items_tx: Sender<T>,
    items_rx: Receiver<T>,
    pool_tx: Sender<T>,
    pool_rx: Receiver<T>,
    prototype: T,
    cancel: Arc<CancelToken>,
    counters: Arc<HandoffCounters>,
}

impl<T: Clone> Handoff<T> {
    pub(crate) fn new(label: String, capacity: usize, prototype: T, cancel: Arc<CancelToken>) -> Self {
        let (items_tx, items_rx) = bounded(capacity);
        let (pool_tx, pool_rx) = unbounded();
        Self {
            items_tx,
            items_rx,
            pool_tx,
            pool_rx,
            prototype,
            cancel,
            counters: Arc::new(HandoffCounters::new(label, capacity)),
        }
    }

    pub(crate) fn writer(&self) -> Writer<T> {
        Writer {
            tx: self.items_tx.clone(),
            pool_tx: self.pool_tx.clone(),
            pool_rx: self.pool_rx.clone(),
            prototype: self.prototype.clone(),
            cancel: self.cancel.clone(),
            counters: self.counters.clone(),
        }
    }

    pub(crate) fn reader(&self) -> Reader<T> {
        Reader {
            rx: self.items_rx.clone(),
            pool_tx: self.pool_tx.clone(),
            cancel: self.cancel.clone(),
            counters: self.counters.clone(),
        }
    }

    pub(crate) fn counters(&self) -> Arc<HandoffCounters> {
        self.counters.clone()
    }
}

/// Upstream end of a hand-off, one per writing replica.
#[derive(Debug)]
pub(crate) struct Writer<T> {
    tx: Sender<T>,
    pool_tx: Sender<T>,
    pool_rx: Receiver<T>,
    prototype: T,
    cancel: Arc<CancelToken>,
    counters: Arc<HandoffCounters>,
}

impl<T: Clone> Writer<T> {
    /// A slot to fill: a recycled item if one is free, otherwise a fresh
    /// clone of the prototype. Recycled slots keep their previous contents.
    pub(crate) fn slot(&self) -> T {
        match self.pool_rx.try_recv() {
            Ok(item) => item,
            Err(_) => {
                self.counters.record_alloc();
                self.prototype.clone()
            }
        }
    }

    pub(crate) fn recycle(&self, item: T) {
        let _ = self.pool_tx.try_send(item);
    }

    /// Push `item` downstream, blocking while the buffer is full.
    ///
    /// Returns `false` when the pipeline was cancelled or every reader is
    /// gone; the item is dropped in that case.
    pub(crate) fn write(&self, item: T) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let sent = select! {
            send(self.tx, item) -> res => res.is_ok(),
            recv(self.cancel.signal) -> _ => false,
        };

        if sent {
            self.counters.record_push(self.tx.len());
        }
        sent
    }
}

/// Downstream end of a hand-off, one per reading replica.
#[derive(Debug)]
pub(crate) struct Reader<T> {
    rx: Receiver<T>,
    pool_tx: Sender<T>,
    cancel: Arc<CancelToken>,
    counters: Arc<HandoffCounters>,
}

impl<T> Reader<T> {
    /// Next item, blocking while the buffer is empty.
    ///
    /// Returns `None` once every writer is gone and the buffer is drained,
    /// or as soon as the pipeline is cancelled.
    pub(crate) fn read(&self) -> Option<T> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let item = select! {
            recv(self.rx) -> msg => msg.ok(),
            recv(self.cancel.signal) -> _ => None,
        };

        if item.is_some() {
            self.counters.record_pop();
        }
        item
    }

    /// Return a consumed item to the free pool.
    pub(crate) fn recycle(&self, item: T) {
        let _ = self.pool_tx.try_send(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn handoff(capacity: usize) -> Handoff<u32> {
        Handoff::new("test".into(), capacity, 0, Arc::new(CancelToken::new()))
    }

    #[test]
    fn test_fifo_then_end_of_stream() {
        let handoff = handoff(4);
        let writer = handoff.writer();
        let reader = handoff.reader();
        drop(handoff);

        for i in 1..=3 {
            assert!(writer.write(i));
        }
        drop(writer);

        assert_eq!(reader.read(), Some(1));
        assert_eq!(reader.read(), Some(2));
        assert_eq!(reader.read(), Some(3));
        assert_eq!(reader.read(), None);
    }

    #[test]
    fn test_stream_ends_with_last_writer() {
        let handoff = handoff(4);
        let first = handoff.writer();
        let second = handoff.writer();
        let reader = handoff.reader();
        drop(handoff);

        assert!(first.write(1));
        drop(first);
        assert_eq!(reader.read(), Some(1));

        assert!(second.write(2));
        assert_eq!(reader.read(), Some(2));
        drop(second);
        assert_eq!(reader.read(), None);
    }

    #[test]
    fn test_write_fails_without_readers() {
        let handoff = handoff(1);
        let writer = handoff.writer();
        drop(handoff.reader());
        drop(handoff);

        assert!(!writer.write(1));
    }

    #[test]
    fn test_slots_are_recycled() {
        let handoff = Handoff::new("pool".into(), 2, vec![0u8; 16], Arc::new(CancelToken::new()));
        let writer = handoff.writer();
        let reader = handoff.reader();

        let mut slot = writer.slot();
        slot[0] = 9;
        assert!(writer.write(slot));

        let item = reader.read().unwrap();
        reader.recycle(item);

        let reused = writer.slot();
        assert_eq!(reused[0], 9);
        assert_eq!(handoff.counters().snapshot().allocated, 1);
    }

    #[test]
    fn test_cancel_wakes_blocked_writer() {
        let handoff = handoff(1);
        let writer = handoff.writer();
        let _reader = handoff.reader();
        let cancel = handoff.cancel.clone();

        assert!(writer.write(1));

        thread::scope(|s| {
            let blocked = s.spawn(|| writer.write(2));
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
            assert!(!blocked.join().unwrap());
        });
    }

    #[test]
    fn test_cancel_wakes_blocked_reader() {
        let handoff = handoff(1);
        let _writer = handoff.writer();
        let reader = handoff.reader();
        let cancel = handoff.cancel.clone();

        thread::scope(|s| {
            let blocked = s.spawn(|| reader.read());
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
            assert_eq!(blocked.join().unwrap(), None);
        });
    }
}
