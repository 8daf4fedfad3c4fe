pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Task(String),

    #[error("worker panic: {0}")]
    WorkerPanic(String),

    #[error("exception thrown from {failed} of {total} threads \"{name}\"")]
    GroupFailed {
        name: String,
        failed: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("executor error: {0}")]
    Executor(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Domain failure raised by a functor or stage.
    pub fn task<S: Into<String>>(msg: S) -> Self {
        Error::Task(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn custom<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Custom(Box::new(error))
    }

    /// The first replica failure behind a group failure, or `self`.
    pub fn root(&self) -> &Error {
        match self {
            Error::GroupFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
