pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{multi, Functor, ThreadGroupHandle, ThreadHandle};
pub use crate::queue::{run_queue, run_queue_with_pipe, Pipe, Pipeline, Sink, Source};
pub use crate::runtime::number_of_threads;
pub use crate::scope::{scope, Scope};
pub use crate::{init, init_with_config, shutdown};
