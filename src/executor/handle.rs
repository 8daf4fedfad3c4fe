//! Join-on-drop handles over scoped OS threads.

use super::functor::{Functor, Replica};
use super::panic_handler::{catch_panic, PanicInfo};
use crate::config::Config;
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::registry::ProcessRegistry;
use crate::scope::Scope;
use std::fmt;
use std::thread::{self, ScopedJoinHandle};

/// Owns one running thread for the lifetime of the handle.
///
/// [`wait`](ThreadHandle::wait) returns the thread's failure, if any. A
/// handle dropped without waiting still joins the thread but only reports a
/// failure through [`diagnostics`], since dropping commonly happens while
/// another error is already being returned.
pub struct ThreadHandle<'scope> {
    name: String,
    thread: Option<ScopedJoinHandle<'scope, Result<()>>>,
}

impl<'scope> ThreadHandle<'scope> {
    pub(crate) fn spawn<'env, F>(
        scope: &'scope thread::Scope<'scope, 'env>,
        config: &Config,
        name: &str,
        body: F,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<()> + Send + 'scope,
    {
        tracing::debug!(target: "tandem", thread = name, "launching thread");

        let registration = ProcessRegistry::global().register();

        let mut builder = thread::Builder::new().name(name.to_owned());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread = builder
            .spawn_scoped(scope, move || {
                let _registration = registration;
                catch_panic(body)
            })
            .map_err(|e| Error::executor(format!("spawn failed for \"{}\": {}", name, e)))?;

        Ok(Self {
            name: name.to_owned(),
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |thread| thread.is_finished())
    }

    /// Block until the thread terminates and return its outcome.
    pub fn wait(mut self) -> Result<()> {
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        tracing::debug!(target: "tandem", thread = %self.name, "waiting for completion of thread");

        let outcome = match thread.join() {
            Ok(result) => result,
            Err(payload) => Err(Error::WorkerPanic(PanicInfo::from_payload(payload).message)),
        };

        if outcome.is_ok() {
            tracing::debug!(target: "tandem", thread = %self.name, "thread completed OK");
        }
        outcome
    }
}

impl Drop for ThreadHandle<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.join() {
            diagnostics::report_failure(&self.name, &error);
        }
    }
}

impl fmt::Debug for ThreadHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Owns every replica of a functor launched as a group.
///
/// Waiting joins all replicas, even after one of them failed; replicas are
/// never cancelled by a sibling's failure.
pub struct ThreadGroupHandle<'scope> {
    name: String,
    threads: Vec<ThreadHandle<'scope>>,
}

impl<'scope> ThreadGroupHandle<'scope> {
    pub(crate) fn spawn<'env, F>(
        scope: &Scope<'scope, 'env>,
        name: &str,
        replicas: Vec<Replica<'scope, F>>,
    ) -> Result<Self>
    where
        F: Functor + Send + 'scope,
    {
        if replicas.is_empty() {
            return Err(Error::config(format!(
                "thread group \"{}\" needs at least one replica",
                name
            )));
        }

        tracing::debug!(
            target: "tandem",
            threads = replicas.len(),
            group = name,
            "launching thread group",
        );

        let mut threads = Vec::with_capacity(replicas.len());
        for (index, mut replica) in replicas.into_iter().enumerate() {
            let thread_name = format!("{}-{}", name, index);
            threads.push(scope.spawn(&thread_name, move || replica.execute())?);
        }

        Ok(Self {
            name: name.to_owned(),
            threads,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(ThreadHandle::is_finished)
    }

    /// Block until every replica terminates.
    ///
    /// Each failing replica is reported as a diagnostic; the returned
    /// [`Error::GroupFailed`] carries the first of them as its source.
    pub fn wait(mut self) -> Result<()> {
        self.join_all()
    }

    fn join_all(&mut self) -> Result<()> {
        let threads = std::mem::take(&mut self.threads);
        let total = threads.len();

        tracing::debug!(target: "tandem", group = %self.name, "waiting for completion of threads");

        let mut failed = 0;
        let mut first = None;
        for thread in threads {
            let name = thread.name().to_owned();
            if let Err(error) = thread.wait() {
                failed += 1;
                diagnostics::report_failure(&name, &error);
                first.get_or_insert(error);
            }
        }

        match first {
            None => {
                tracing::debug!(target: "tandem", group = %self.name, "threads completed OK");
                Ok(())
            }
            Some(source) => Err(Error::GroupFailed {
                name: self.name.clone(),
                failed,
                total,
                source: Box::new(source),
            }),
        }
    }
}

impl Drop for ThreadGroupHandle<'_> {
    fn drop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        if let Err(error) = self.join_all() {
            diagnostics::report_failure(&self.name, &error);
        }
    }
}

impl fmt::Debug for ThreadGroupHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadGroupHandle")
            .field("name", &self.name)
            .field("threads", &self.threads)
            .finish()
    }
}
