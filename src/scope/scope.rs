use crate::config::Config;
use crate::error::Result;
use crate::executor::{Launch, ThreadHandle};
use crate::runtime;
use std::fmt;
use std::sync::Arc;
use std::thread;

/// The lexical region inside which launched threads live.
///
/// Every thread started through a `Scope` is joined before [`scope`]
/// returns, so functors may borrow from the enclosing stack frame.
pub struct Scope<'scope, 'env: 'scope> {
    inner: &'scope thread::Scope<'scope, 'env>,
    config: Arc<Config>,
}

impl<'scope, 'env> Scope<'scope, 'env> {
    /// Launch `target` on its own thread(s).
    ///
    /// `&mut functor` starts one thread and returns a
    /// [`ThreadHandle`]; [`multi(&mut functor, n)`](crate::multi) starts `n`
    /// and returns a [`ThreadGroupHandle`](crate::ThreadGroupHandle).
    pub fn run<L>(&self, target: L, name: &str) -> Result<L::Handle>
    where
        L: Launch<'scope>,
    {
        target.launch(self, name)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn spawn<F>(&self, name: &str, body: F) -> Result<ThreadHandle<'scope>>
    where
        F: FnOnce() -> Result<()> + Send + 'scope,
    {
        ThreadHandle::spawn(self.inner, &self.config, name, body)
    }
}

impl fmt::Debug for Scope<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("config", &self.config).finish()
    }
}

/// Run `f` with a [`Scope`] for launching threads; returns once every thread
/// launched in it has terminated.
///
/// ```
/// use tandem::{multi, scope, Result};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let hits = AtomicUsize::new(0);
/// let mut work = || -> Result<()> {
///     hits.fetch_add(1, Ordering::Relaxed);
///     Ok(())
/// };
///
/// scope(|s| s.run(multi(&mut work, 4), "work")?.wait()).unwrap();
/// assert_eq!(hits.load(Ordering::Relaxed), 4);
/// ```
pub fn scope<'env, F, T>(f: F) -> T
where
    F: for<'scope> FnOnce(&Scope<'scope, 'env>) -> T,
{
    let config = runtime::config();
    thread::scope(move |inner| f(&Scope { inner, config }))
}
