//! Thread launch infrastructure.
//!
//! This module provides the functor abstraction, the join-on-drop thread
//! handles and the dispatch that picks a single or replicated launch.

pub mod functor;
pub mod handle;
pub mod launch;
pub mod panic_handler;

pub use functor::{Functor, Replica};
pub use handle::{ThreadGroupHandle, ThreadHandle};
pub use launch::{multi, IntoReplicas, Launch, Multi};
pub use panic_handler::{catch_panic, PanicInfo};
