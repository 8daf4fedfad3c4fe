//! Process-wide, reference-counted thread support state.
//!
//! The first live [`Registration`] installs a [`Backend`] which serializes
//! diagnostic output coming from worker threads; the last one to go away
//! tears it down again. Every launched execution unit holds a registration
//! of the global registry for as long as it runs.

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Instant;

static GLOBAL: ProcessRegistry = ProcessRegistry::new();

/// State installed while at least one thread is registered.
#[derive(Debug)]
pub struct Backend {
    report_lock: Mutex<()>,
    installed_at: Instant,
}

impl Backend {
    fn install() -> Self {
        tracing::debug!(target: "tandem", "installing thread support backend");
        Self {
            report_lock: Mutex::new(()),
            installed_at: Instant::now(),
        }
    }

    /// Serializes diagnostic output for as long as the guard lives.
    pub fn lock_reports(&self) -> MutexGuard<'_, ()> {
        self.report_lock.lock()
    }

    pub fn installed_at(&self) -> Instant {
        self.installed_at
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        tracing::debug!(
            target: "tandem",
            uptime = ?self.installed_at.elapsed(),
            "thread support backend torn down",
        );
    }
}

#[derive(Debug)]
struct RegistryState {
    refcount: usize,
    backend: Option<Arc<Backend>>,
    installs: u64,
    teardowns: u64,
}

#[derive(Debug)]
pub struct ProcessRegistry {
    state: Mutex<RegistryState>,
}

impl ProcessRegistry {
    pub const fn new() -> Self {
        Self {
            state: parking_lot::const_mutex(RegistryState {
                refcount: 0,
                backend: None,
                installs: 0,
                teardowns: 0,
            }),
        }
    }

    /// The registry shared by every launched thread in the process.
    pub fn global() -> &'static ProcessRegistry {
        &GLOBAL
    }

    pub fn register(&self) -> Registration<'_> {
        let mut state = self.state.lock();
        if state.refcount == 0 {
            state.backend = Some(Arc::new(Backend::install()));
            state.installs += 1;
        }
        state.refcount += 1;

        Registration { registry: self }
    }

    fn unregister(&self) {
        // The backend is dropped after the lock is released.
        let retired = {
            let mut state = self.state.lock();
            debug_assert!(state.refcount > 0, "unbalanced thread registration");
            state.refcount = state.refcount.saturating_sub(1);
            if state.refcount == 0 {
                state.teardowns += 1;
                state.backend.take()
            } else {
                None
            }
        };
        drop(retired);
    }

    pub fn refcount(&self) -> usize {
        self.state.lock().refcount
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().backend.is_some()
    }

    pub fn backend(&self) -> Option<Arc<Backend>> {
        self.state.lock().backend.clone()
    }

    /// Number of times the backend has been installed.
    pub fn installs(&self) -> u64 {
        self.state.lock().installs
    }

    /// Number of times the backend has been torn down.
    pub fn teardowns(&self) -> u64 {
        self.state.lock().teardowns
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A live registration; dropping it unregisters.
#[derive(Debug)]
#[must_use = "dropping a registration unregisters immediately"]
pub struct Registration<'r> {
    registry: &'r ProcessRegistry,
}

impl Registration<'_> {
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.unregister();
    }
}
