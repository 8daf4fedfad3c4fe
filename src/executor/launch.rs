//! Static dispatch between single and replicated launches.
//!
//! `scope.run(&mut f, name)` yields a [`ThreadHandle`];
//! `scope.run(multi(&mut f, n), name)` yields a [`ThreadGroupHandle`]. The
//! call site looks the same either way; replication is a modifier on the
//! functor argument.

use super::functor::{Functor, Replica};
use super::handle::{ThreadGroupHandle, ThreadHandle};
use crate::error::Result;
use crate::runtime;
use crate::scope::Scope;

/// Something [`Scope::run`] knows how to start.
pub trait Launch<'scope> {
    type Handle;

    fn launch<'env>(self, scope: &Scope<'scope, 'env>, name: &str) -> Result<Self::Handle>;
}

impl<'scope, F> Launch<'scope> for &'scope mut F
where
    F: Functor + Send,
{
    type Handle = ThreadHandle<'scope>;

    fn launch<'env>(self, scope: &Scope<'scope, 'env>, name: &str) -> Result<ThreadHandle<'scope>> {
        scope.spawn(name, move || self.execute())
    }
}

impl<'scope, F> Launch<'scope> for Multi<'scope, F>
where
    F: Functor + Clone + Send,
{
    type Handle = ThreadGroupHandle<'scope>;

    fn launch<'env>(
        self,
        scope: &Scope<'scope, 'env>,
        name: &str,
    ) -> Result<ThreadGroupHandle<'scope>> {
        ThreadGroupHandle::spawn(scope, name, self.into_replicas())
    }
}

/// A request to run `count` copies of a functor.
#[derive(Debug)]
pub struct Multi<'a, F> {
    functor: &'a mut F,
    count: usize,
}

/// Request `count` parallel instances of `functor`, or
/// [`number_of_threads()`](crate::number_of_threads) when `count` is zero.
///
/// The caller's functor is always one of the instances; the other `count - 1`
/// are clones of it.
pub fn multi<F>(functor: &mut F, count: usize) -> Multi<'_, F> {
    Multi { functor, count }
}

impl<'a, F> Multi<'a, F> {
    /// The number of instances this request resolves to.
    pub fn count(&self) -> usize {
        if self.count == 0 {
            runtime::number_of_threads()
        } else {
            self.count
        }
    }
}

/// Conversion of a stage argument into the instances that will run it.
pub trait IntoReplicas<'a> {
    type Functor;

    fn into_replicas(self) -> Vec<Replica<'a, Self::Functor>>;
}

impl<'a, F> IntoReplicas<'a> for &'a mut F {
    type Functor = F;

    fn into_replicas(self) -> Vec<Replica<'a, F>> {
        vec![Replica::Borrowed(self)]
    }
}

impl<'a, F> IntoReplicas<'a> for Multi<'a, F>
where
    F: Clone,
{
    type Functor = F;

    fn into_replicas(self) -> Vec<Replica<'a, F>> {
        let count = self.count();
        let mut replicas = Vec::with_capacity(count);
        for _ in 1..count {
            replicas.push(Replica::Owned(F::clone(self.functor)));
        }
        // the original runs too, last
        replicas.push(Replica::Borrowed(self.functor));
        replicas
    }
}
