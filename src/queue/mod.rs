//! Bounded multi-stage pipelines.
//!
//! Stages run on their own threads and exchange items through bounded
//! hand-offs: a full hand-off blocks its writers, an empty one blocks its
//! readers. See [`Pipeline`] for the builder and [`run_queue`] for the
//! common two-stage case.

pub(crate) mod handoff;
pub mod pipeline;
pub mod stage;
pub mod stats;

pub use pipeline::{run_queue, run_queue_with_pipe, Pipeline, ReadyPipeline};
pub use stage::{Pipe, Sink, Source};
pub use stats::{HandoffStats, PipelineStats};
