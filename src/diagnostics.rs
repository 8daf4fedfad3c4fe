//! Side channel for failures that cannot be returned to a caller.
//!
//! Handles dropped without an explicit `wait()`, the individual replicas of a
//! failed group and the secondary failures of a pipeline all end up here.
//! Every report becomes a `tracing` error event and, if one is installed, is
//! passed to the application hook. While the process registry is active the
//! reports are serialized through its backend.

use crate::error::Error;
use crate::registry::ProcessRegistry;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Hook = Arc<dyn Fn(&Diagnostic) + Send + Sync + 'static>;

static HOOK: RwLock<Option<Hook>> = RwLock::new(None);
static REPORTED: AtomicU64 = AtomicU64::new(0);

/// A failure reported through the side channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Name of the thread, group or pipeline stage that failed.
    pub thread: String,
    pub message: String,
}

/// Install `hook` to receive every subsequent diagnostic, replacing any
/// previous one. The hook runs with reports serialized and must not report
/// diagnostics itself.
pub fn set_hook<F>(hook: F)
where
    F: Fn(&Diagnostic) + Send + Sync + 'static,
{
    *HOOK.write() = Some(Arc::new(hook));
}

pub fn clear_hook() {
    *HOOK.write() = None;
}

/// Total number of diagnostics reported by this process.
pub fn reported() -> u64 {
    REPORTED.load(Ordering::Relaxed)
}

pub fn report_failure(thread: &str, error: &Error) {
    report(Diagnostic {
        thread: thread.to_owned(),
        message: error.to_string(),
    });
}

pub fn report(diagnostic: Diagnostic) {
    REPORTED.fetch_add(1, Ordering::Relaxed);

    let hook = HOOK.read().clone();
    let backend = ProcessRegistry::global().backend();
    let _serial = backend.as_ref().map(|backend| backend.lock_reports());

    tracing::error!(
        target: "tandem",
        thread = %diagnostic.thread,
        "{}",
        diagnostic.message,
    );

    if let Some(hook) = hook {
        hook(&diagnostic);
    }
}
