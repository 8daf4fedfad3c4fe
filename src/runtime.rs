//! Process-wide configuration consumed by launches and pipelines.

use crate::config::Config;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

// Explicitly installed configuration
static GLOBAL_CONFIG: RwLock<Option<Arc<Config>>> = RwLock::new(None);

// Fallback read from the environment on first use
static ENV_CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

/// Install the configuration read from the environment.
pub fn init() -> Result<()> {
    init_with_config(Config::from_env()?)
}

pub fn init_with_config(config: Config) -> Result<()> {
    config.validate()?;

    let mut current = GLOBAL_CONFIG.write();
    if current.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    tracing::debug!(
        target: "tandem",
        num_threads = config.worker_threads(),
        queue_capacity = config.queue_capacity,
        "configuration installed",
    );
    *current = Some(Arc::new(config));
    Ok(())
}

/// The active configuration: the one passed to [`init_with_config`], or the
/// environment defaults when nothing was installed.
pub fn config() -> Arc<Config> {
    if let Some(config) = GLOBAL_CONFIG.read().as_ref() {
        return config.clone();
    }

    ENV_CONFIG
        .get_or_init(|| match Config::from_env() {
            Ok(config) => Arc::new(config),
            Err(error) => {
                tracing::warn!(
                    target: "tandem",
                    %error,
                    "ignoring invalid environment configuration",
                );
                Arc::new(Config::default())
            }
        })
        .clone()
}

/// The number of worker threads to use when a caller does not say.
pub fn number_of_threads() -> usize {
    config().worker_threads()
}

pub fn shutdown() {
    *GLOBAL_CONFIG.write() = None;
}
