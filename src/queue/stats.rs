//! Counters kept by every hand-off and the snapshot returned by a run.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub(crate) struct HandoffCounters {
    label: String,
    capacity: usize,
    pushed: AtomicU64,
    popped: AtomicU64,
    high_water: AtomicUsize,
    allocated: AtomicUsize,
}

impl HandoffCounters {
    pub(crate) fn new(label: String, capacity: usize) -> Self {
        Self {
            label,
            capacity,
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            high_water: AtomicUsize::new(0),
            allocated: AtomicUsize::new(0),
        }
    }

    pub(crate) fn record_push(&self, buffered: usize) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.high_water.fetch_max(buffered, Ordering::Relaxed);
    }

    pub(crate) fn record_pop(&self) {
        self.popped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_alloc(&self) {
        self.allocated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> HandoffStats {
        HandoffStats {
            label: self.label.clone(),
            capacity: self.capacity,
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            high_water: self.high_water.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
        }
    }
}

/// Counters for one hand-off between adjacent stages.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HandoffStats {
    pub label: String,
    pub capacity: usize,
    /// Items accepted from upstream.
    pub pushed: u64,
    /// Items handed to downstream.
    pub popped: u64,
    /// Largest number of buffered items seen right after a push.
    pub high_water: usize,
    /// Item slots cloned from the prototype rather than recycled.
    pub allocated: usize,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PipelineStats {
    pub name: String,
    pub elapsed: Duration,
    /// One entry per hand-off, in stage order.
    pub handoffs: Vec<HandoffStats>,
}

impl PipelineStats {
    /// Items that reached the final stage.
    pub fn delivered(&self) -> u64 {
        self.handoffs.last().map_or(0, |h| h.popped)
    }
}
