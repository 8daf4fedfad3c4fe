//! Tandem - scoped threads and bounded pipelines
//!
//! Launch functors on named threads whose lifetimes are tied to a lexical
//! scope, replicate them across a group with [`multi`], or connect stages
//! into a producer/consumer pipeline with bounded queues between them.
//!
//! # Quick Start
//!
//! ```
//! use tandem::prelude::*;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! let total = AtomicU64::new(0);
//! let mut work = || -> Result<()> {
//!     total.fetch_add(1, Ordering::Relaxed);
//!     Ok(())
//! };
//!
//! scope(|s| -> Result<()> {
//!     let group = s.run(multi(&mut work, 4), "worker")?;
//!     group.wait()
//! })
//! .unwrap();
//!
//! assert_eq!(total.load(Ordering::Relaxed), 4);
//! ```
//!
//! # Features
//!
//! - **Scoped Launches**: Functors may borrow from the caller's stack frame
//! - **Thread Groups**: One call starts `n` replicas and joins them together
//! - **Pipelines**: Source, pipe and sink stages with bounded hand-offs
//! - **Failure Reporting**: Errors and panics reach the caller or the
//!   [`diagnostics`] hook, never silently lost
//! - **Configuration**: Thread count and queue capacity from code or the
//!   environment

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod queue;
pub mod registry;
pub mod runtime;
pub mod scope;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{multi, Functor, Launch, Multi, ThreadGroupHandle, ThreadHandle};
pub use queue::{run_queue, run_queue_with_pipe, Pipeline};
pub use registry::ProcessRegistry;
pub use runtime::{init, init_with_config, number_of_threads, shutdown};
pub use scope::{scope, Scope};
