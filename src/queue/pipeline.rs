//! Multi-stage producer/consumer pipelines.
//!
//! A pipeline is a [`Source`], any number of [`Pipe`]s and a [`Sink`], each
//! run by one or more threads, connected by bounded hand-offs:
//!
//! ```
//! use tandem::queue::Pipeline;
//! use tandem::{multi, Result};
//!
//! let mut next = 0u64;
//! let mut source = |item: &mut u64| -> Result<bool> {
//!     next += 1;
//!     *item = next;
//!     Ok(next <= 1000)
//! };
//! let mut square = |n: &u64, out: &mut u64| -> Result<bool> {
//!     *out = n * n;
//!     Ok(true)
//! };
//! let mut total = 0u64;
//! let mut sink = |n: &u64| -> Result<bool> {
//!     total += n;
//!     Ok(true)
//! };
//!
//! Pipeline::source(&mut source, 0u64)
//!     .pipe(multi(&mut square, 4), 0u64)
//!     .sink(&mut sink)
//!     .run()
//!     .unwrap();
//! drop(sink);
//! assert_eq!(total, (1..=1000u64).map(|n| n * n).sum());
//! ```
//!
//! The first failing stage cancels the whole pipeline: every blocked push or
//! pop wakes up, no new items are accepted, and [`ReadyPipeline::run`] returns
//! that failure once every thread has stopped. Failures of other stages in
//! the meantime are only reported through [`diagnostics`](crate::diagnostics).

use super::handoff::{CancelToken, Handoff};
use super::stage::{drive_pipe, drive_sink, drive_source, Pipe, Sink, Source};
use super::stats::{HandoffCounters, PipelineStats};
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::executor::{catch_panic, IntoReplicas};
use crate::runtime;
use crate::scope::scope;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_NAME: &str = "queue";

/// State shared by every worker of one pipeline run.
#[derive(Debug)]
struct Shared {
    cancel: Arc<CancelToken>,
    failure: Mutex<Option<Error>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            cancel: Arc::new(CancelToken::new()),
            failure: Mutex::new(None),
        }
    }

    /// Keep the first failure, report the rest, and stop the pipeline.
    fn fail(&self, stage: &str, error: Error) {
        let secondary = {
            let mut failure = self.failure.lock();
            if failure.is_none() {
                tracing::debug!(target: "tandem", stage, %error, "stage failed, cancelling pipeline");
                *failure = Some(error);
                None
            } else {
                Some(error)
            }
        };

        if let Some(error) = secondary {
            diagnostics::report_failure(stage, &error);
        }
        self.cancel.cancel();
    }

    fn take_failure(&self) -> Option<Error> {
        self.failure.lock().take()
    }
}

/// One thread's worth of stage work, bound to its hand-off endpoints.
struct Worker<'a> {
    label: String,
    body: Box<dyn FnOnce(&str) + Send + 'a>,
}

impl<'a> Worker<'a> {
    fn new<F>(shared: &Arc<Shared>, label: String, work: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'a,
    {
        let shared = shared.clone();
        Self {
            label,
            body: Box::new(move |name: &str| {
                if let Err(error) = catch_panic(work) {
                    shared.fail(name, error);
                }
            }),
        }
    }
}

/// Binds the writers of the most recently added stage to a hand-off.
type Feed<'a, T> = Box<dyn FnOnce(&Handoff<T>) -> Vec<Worker<'a>> + 'a>;

/// A pipeline under construction whose last stage produces `T`.
pub struct Pipeline<'a, T> {
    name: String,
    shared: Arc<Shared>,
    workers: Vec<Worker<'a>>,
    handoffs: Vec<Arc<HandoffCounters>>,
    feed: Feed<'a, T>,
    prototype: T,
    capacity: Option<usize>,
    stages: usize,
    invalid: Option<Error>,
}

impl<'a, T> Pipeline<'a, T>
where
    T: Clone + Send + 'a,
{
    /// Start a pipeline with `stage` as its source.
    ///
    /// `stage` is `&mut source` for a single thread or
    /// [`multi(&mut source, n)`](crate::multi) for `n` threads; the stream
    /// ends once every source replica has returned `Ok(false)`.
    pub fn source<R, S>(stage: R, prototype: T) -> Self
    where
        R: IntoReplicas<'a, Functor = S>,
        S: Source<T> + Send + 'a,
    {
        let shared = Arc::new(Shared::new());
        let replicas = stage.into_replicas();

        let feed_shared = shared.clone();
        let feed: Feed<'a, T> = Box::new(move |handoff: &Handoff<T>| {
            replicas
                .into_iter()
                .enumerate()
                .map(|(index, mut replica)| {
                    let output = handoff.writer();
                    Worker::new(&feed_shared, format!("source-{}", index), move || {
                        drive_source(&mut *replica, &output)
                    })
                })
                .collect()
        });

        Self {
            name: DEFAULT_NAME.to_owned(),
            shared,
            workers: Vec::new(),
            handoffs: Vec::new(),
            feed,
            prototype,
            capacity: None,
            stages: 1,
            invalid: None,
        }
    }

    /// Name used for the pipeline's threads and diagnostics.
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Capacity of the hand-off after the most recently added stage.
    ///
    /// Defaults to [`Config::queue_capacity`](crate::Config::queue_capacity).
    pub fn capacity(mut self, capacity: usize) -> Self {
        if capacity == 0 {
            self.invalid
                .get_or_insert_with(|| Error::config("queue capacity must be > 0"));
        }
        self.capacity = Some(capacity);
        self
    }

    /// Append a transform stage producing items of type `U`.
    pub fn pipe<R, P, U>(self, stage: R, prototype: U) -> Pipeline<'a, U>
    where
        R: IntoReplicas<'a, Functor = P>,
        P: Pipe<T, U> + Send + 'a,
        U: Clone + Send + 'a,
    {
        let Pipeline {
            name,
            shared,
            mut workers,
            mut handoffs,
            feed,
            prototype: upstream,
            capacity,
            stages,
            invalid,
        } = self;

        let input = open_handoff(&shared, &mut handoffs, &mut workers, upstream, capacity, feed);
        let replicas = stage.into_replicas();
        let feed_shared = shared.clone();

        let feed: Feed<'a, U> = Box::new(move |handoff: &Handoff<U>| {
            replicas
                .into_iter()
                .enumerate()
                .map(|(index, mut replica)| {
                    let reader = input.reader();
                    let writer = handoff.writer();
                    Worker::new(&feed_shared, format!("pipe{}-{}", stages, index), move || {
                        drive_pipe(&mut *replica, &reader, &writer)
                    })
                })
                .collect()
        });

        Pipeline {
            name,
            shared,
            workers,
            handoffs,
            feed,
            prototype,
            capacity: None,
            stages: stages + 1,
            invalid,
        }
    }

    /// Finish the pipeline with `stage` as its sink.
    pub fn sink<R, K>(self, stage: R) -> ReadyPipeline<'a>
    where
        R: IntoReplicas<'a, Functor = K>,
        K: Sink<T> + Send + 'a,
    {
        let Pipeline {
            name,
            shared,
            mut workers,
            mut handoffs,
            feed,
            prototype,
            capacity,
            invalid,
            ..
        } = self;

        let input = open_handoff(&shared, &mut handoffs, &mut workers, prototype, capacity, feed);
        for (index, mut replica) in stage.into_replicas().into_iter().enumerate() {
            let reader = input.reader();
            workers.push(Worker::new(&shared, format!("sink-{}", index), move || {
                drive_sink(&mut *replica, &reader)
            }));
        }
        // every endpoint now exists; the hand-off's own ends must go
        drop(input);

        ReadyPipeline {
            name,
            shared,
            workers,
            handoffs,
            invalid,
        }
    }
}

// Creates the hand-off after a stage and binds that stage's writers to it.
fn open_handoff<'a, T>(
    shared: &Shared,
    handoffs: &mut Vec<Arc<HandoffCounters>>,
    workers: &mut Vec<Worker<'a>>,
    prototype: T,
    capacity: Option<usize>,
    feed: Feed<'a, T>,
) -> Handoff<T>
where
    T: Clone,
{
    let capacity = capacity.unwrap_or_else(|| runtime::config().queue_capacity);
    let handoff = Handoff::new(
        format!("handoff-{}", handoffs.len()),
        capacity,
        prototype,
        shared.cancel.clone(),
    );
    handoffs.push(handoff.counters());
    workers.extend(feed(&handoff));
    handoff
}

impl<T> fmt::Debug for Pipeline<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("workers", &self.workers.len())
            .finish()
    }
}

/// A fully assembled pipeline, ready to [`run`](ReadyPipeline::run).
pub struct ReadyPipeline<'a> {
    name: String,
    shared: Arc<Shared>,
    workers: Vec<Worker<'a>>,
    handoffs: Vec<Arc<HandoffCounters>>,
    invalid: Option<Error>,
}

impl ReadyPipeline<'_> {
    /// Number of threads the pipeline will start.
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Run every stage to completion, blocking the calling thread.
    ///
    /// Returns once the stream has drained through the sink, or once every
    /// thread has stopped after the first failure, which is then returned.
    pub fn run(self) -> Result<PipelineStats> {
        let ReadyPipeline {
            name,
            shared,
            workers,
            handoffs,
            invalid,
        } = self;

        if let Some(error) = invalid {
            return Err(error);
        }

        let start = Instant::now();
        tracing::debug!(target: "tandem", pipeline = %name, threads = workers.len(), "launching pipeline");

        scope(|s| {
            let mut handles = Vec::with_capacity(workers.len());
            for Worker { label, body } in workers {
                let thread_name = format!("{}-{}", name, label);
                let stage_name = thread_name.clone();
                match s.spawn(&thread_name, move || {
                    body(&stage_name);
                    Ok(())
                }) {
                    Ok(handle) => handles.push(handle),
                    Err(error) => {
                        shared.fail(&thread_name, error);
                        break;
                    }
                }
            }

            for handle in handles {
                let thread_name = handle.name().to_owned();
                if let Err(error) = handle.wait() {
                    shared.fail(&thread_name, error);
                }
            }
        });

        let stats = PipelineStats {
            name,
            elapsed: start.elapsed(),
            handoffs: handoffs.iter().map(|h| h.snapshot()).collect(),
        };

        match shared.take_failure() {
            Some(error) => Err(error),
            None => {
                tracing::debug!(
                    target: "tandem",
                    pipeline = %stats.name,
                    elapsed = ?stats.elapsed,
                    delivered = stats.delivered(),
                    "pipeline completed OK",
                );
                Ok(stats)
            }
        }
    }
}

impl fmt::Debug for ReadyPipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyPipeline")
            .field("name", &self.name)
            .field("workers", &self.workers.len())
            .field("handoffs", &self.handoffs.len())
            .finish()
    }
}

/// Run `source` into `sink` through one hand-off of `prototype` items.
pub fn run_queue<'a, T, RS, S, RK, K>(source: RS, prototype: T, sink: RK) -> Result<PipelineStats>
where
    T: Clone + Send + 'a,
    RS: IntoReplicas<'a, Functor = S>,
    S: Source<T> + Send + 'a,
    RK: IntoReplicas<'a, Functor = K>,
    K: Sink<T> + Send + 'a,
{
    Pipeline::source(source, prototype).sink(sink).run()
}

/// Run `source` through `pipe` into `sink`.
pub fn run_queue_with_pipe<'a, T, U, RS, S, RP, P, RK, K>(
    source: RS,
    input: T,
    pipe: RP,
    output: U,
    sink: RK,
) -> Result<PipelineStats>
where
    T: Clone + Send + 'a,
    U: Clone + Send + 'a,
    RS: IntoReplicas<'a, Functor = S>,
    S: Source<T> + Send + 'a,
    RP: IntoReplicas<'a, Functor = P>,
    P: Pipe<T, U> + Send + 'a,
    RK: IntoReplicas<'a, Functor = K>,
    K: Sink<U> + Send + 'a,
{
    Pipeline::source(source, input)
        .pipe(pipe, output)
        .sink(sink)
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::testing;
    use crate::multi;
    use crossbeam_channel::bounded;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn counter(limit: u64) -> impl FnMut(&mut u64) -> Result<bool> + Clone {
        let mut next = 0;
        move |item: &mut u64| {
            next += 1;
            *item = next;
            Ok(next <= limit)
        }
    }

    // Runs `f` on its own thread and fails the test if it has not finished in time.
    fn within<T, F>(limit: Duration, f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let _ = tx.send(f());
        });
        rx.recv_timeout(limit).expect("pipeline did not terminate")
    }

    #[test]
    fn test_items_arrive_in_order() {
        let mut source = counter(500);
        let mut received = Vec::new();
        let mut sink = |n: &u64| -> Result<bool> {
            received.push(*n);
            Ok(true)
        };

        let stats = run_queue(&mut source, 0u64, &mut sink).unwrap();
        drop(sink);

        assert_eq!(received, (1..=500).collect::<Vec<_>>());
        assert_eq!(stats.delivered(), 500);
        assert_eq!(stats.handoffs.len(), 1);
    }

    #[test]
    fn test_capacity_bounds_buffered_items() {
        let produced = AtomicU64::new(0);
        let consumed = AtomicU64::new(0);
        let mut source = |item: &mut u64| -> Result<bool> {
            let n = produced.fetch_add(1, Ordering::SeqCst) + 1;
            *item = n;
            Ok(n <= 200)
        };
        let mut sink = |_: &u64| -> Result<bool> {
            let done = consumed.fetch_add(1, Ordering::SeqCst) + 1;
            let ahead = produced.load(Ordering::SeqCst).saturating_sub(done);
            // one buffered, one being filled, one in hand
            assert!(ahead <= 3, "producer ran {} items ahead", ahead);
            thread::yield_now();
            Ok(true)
        };

        let stats = Pipeline::source(&mut source, 0u64)
            .capacity(1)
            .sink(&mut sink)
            .run()
            .unwrap();

        assert_eq!(stats.handoffs[0].capacity, 1);
        assert!(stats.handoffs[0].high_water <= 1);
        assert_eq!(stats.delivered(), 200);
    }

    #[test]
    fn test_failure_stops_every_stage() {
        let result = within(Duration::from_secs(10), || {
            let mut source = counter(u64::MAX);
            let mut pipe = |n: &u64, out: &mut u64| -> Result<bool> {
                *out = *n;
                Ok(true)
            };
            let mut sink = |n: &u64| -> Result<bool> {
                if *n == 50 {
                    return Err(Error::task("sink gave up at 50"));
                }
                Ok(true)
            };

            Pipeline::source(&mut source, 0u64)
                .named("pipeline-fail-unit")
                .capacity(4)
                .pipe(multi(&mut pipe, 3), 0u64)
                .capacity(2)
                .sink(&mut sink)
                .run()
        });

        let error = result.unwrap_err();
        assert_eq!(error.to_string(), "sink gave up at 50");
    }

    #[test]
    fn test_panicking_stage_is_a_failure() {
        let mut source = counter(u64::MAX);
        let mut sink = |n: &u64| -> Result<bool> {
            if *n == 3 {
                panic!("bad item");
            }
            Ok(true)
        };

        let error = run_queue(&mut source, 0u64, &mut sink).unwrap_err();
        assert!(matches!(error, Error::WorkerPanic(_)));
    }

    #[test]
    fn test_sink_stop_ends_unbounded_source() {
        let result = within(Duration::from_secs(10), || {
            let mut source = counter(u64::MAX);
            let mut seen = 0;
            let mut sink = |_: &u64| -> Result<bool> {
                seen += 1;
                Ok(seen < 10)
            };
            run_queue(&mut source, 0u64, &mut sink).map(|stats| (stats, seen))
        });

        let (stats, seen) = result.unwrap();
        assert_eq!(seen, 10);
        assert_eq!(stats.delivered(), 10);
    }

    #[test]
    fn test_replicated_pipe_processes_each_item_once() {
        let mut source = counter(1000);
        let mut double = |n: &u64, out: &mut u64| -> Result<bool> {
            *out = n * 2;
            Ok(true)
        };
        let mut seen = HashSet::new();
        let mut sink = |n: &u64| -> Result<bool> {
            assert!(seen.insert(*n), "{} delivered twice", n);
            Ok(true)
        };

        let stats = run_queue_with_pipe(&mut source, 0u64, multi(&mut double, 4), 0u64, &mut sink)
            .unwrap();
        drop(sink);

        assert_eq!(seen, (1..=1000).map(|n| n * 2).collect::<HashSet<u64>>());
        assert_eq!(stats.handoffs.len(), 2);
        assert_eq!(stats.handoffs[0].popped, 1000);
    }

    #[test]
    fn test_replicated_source_ends_with_last_replica() {
        let remaining = AtomicU64::new(300);
        let mut source = |item: &mut u64| -> Result<bool> {
            match remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
                Ok(n) => {
                    *item = n;
                    Ok(true)
                }
                Err(_) => Ok(false),
            }
        };
        let mut total = 0;
        let mut sink = |_: &u64| -> Result<bool> {
            total += 1;
            Ok(true)
        };

        run_queue(multi(&mut source, 3), 0u64, &mut sink).unwrap();
        drop(sink);

        assert_eq!(total, 300);
    }

    #[test]
    fn test_later_failures_are_reported() {
        testing::capture();
        let both_failing = Barrier::new(2);
        let mut source = counter(u64::MAX);
        let mut sink = |_: &u64| -> Result<bool> {
            both_failing.wait();
            Err(Error::task("replica failed"))
        };

        let error = Pipeline::source(&mut source, 0u64)
            .named("pipeline-report-unit")
            .sink(multi(&mut sink, 2))
            .run()
            .unwrap_err();

        assert_eq!(error.to_string(), "replica failed");
        let reported = testing::messages_for("pipeline-report-unit-sink-0").len()
            + testing::messages_for("pipeline-report-unit-sink-1").len();
        assert_eq!(reported, 1);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let mut source = counter(10);
        let mut sink = |_: &u64| -> Result<bool> { Ok(true) };

        let error = Pipeline::source(&mut source, 0u64)
            .capacity(0)
            .sink(&mut sink)
            .run()
            .unwrap_err();

        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn test_thread_count() {
        let mut source = counter(1);
        let mut pipe = |n: &u64, out: &mut u64| -> Result<bool> {
            *out = *n;
            Ok(true)
        };
        let mut sink = |_: &u64| -> Result<bool> { Ok(true) };

        let ready = Pipeline::source(&mut source, 0u64)
            .pipe(multi(&mut pipe, 3), 0u64)
            .sink(&mut sink);

        assert_eq!(ready.threads(), 5);
        ready.run().unwrap();
    }
}
