use crate::error::{Error, Result};

/// Environment variable overriding the default worker count.
pub const NUM_THREADS_ENV: &str = "TANDEM_NUM_THREADS";

/// Environment variable overriding the default hand-off capacity.
pub const QUEUE_CAPACITY_ENV: &str = "TANDEM_QUEUE_CAPACITY";

pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Config {
    pub num_threads: Option<usize>,
    pub stack_size: Option<usize>,
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            stack_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Defaults with `TANDEM_NUM_THREADS` / `TANDEM_QUEUE_CAPACITY` applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(n) = read_env(NUM_THREADS_ENV)? {
            config.num_threads = Some(n);
        }
        if let Some(n) = read_env(QUEUE_CAPACITY_ENV)? {
            config.queue_capacity = n;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be > 0"));
        }

        if let Some(size) = self.stack_size {
            if size < 16 * 1024 {
                return Err(Error::config("stack_size too small (min 16 KiB)"));
            }
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

fn read_env(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| Error::config(format!("{}={:?}: {}", key, value, e))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::config(format!("{}: {}", key, e))),
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
