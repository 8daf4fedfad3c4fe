use crate::error::{Error, Result};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Runs `f`, turning a panic into [`Error::WorkerPanic`] so that a worker
/// unwinding never tears down its scope.
pub fn catch_panic<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Error::WorkerPanic(PanicInfo::from_payload(payload).message)),
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_becomes_error() {
        let result: Result<()> = catch_panic(|| panic!("test panic"));

        assert!(matches!(result, Err(Error::WorkerPanic(msg)) if msg == "test panic"));
    }

    #[test]
    fn test_formatted_panic_message() {
        let voxel = 17;
        let result: Result<()> = catch_panic(|| panic!("bad voxel {}", voxel));

        assert!(matches!(result, Err(Error::WorkerPanic(msg)) if msg == "bad voxel 17"));
    }

    #[test]
    fn test_success_and_error_pass_through() {
        assert_eq!(catch_panic(|| Ok(42)).unwrap(), 42);

        let result: Result<()> = catch_panic(|| Err(Error::task("failed")));
        assert!(matches!(result, Err(Error::Task(_))));
    }
}
