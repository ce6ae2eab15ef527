use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// A single cancellable delayed callback.
///
/// Scheduling replaces any pending callback, so at most one countdown is
/// ever active. Dropping the timer cancels it.
#[derive(Debug, Default)]
pub struct LockoutTimer {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LockoutTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` after `delay`, aborting the previously scheduled callback.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
        if let Some(old) = self.task.lock().replace(handle) {
            old.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(old) = self.task.lock().take() {
            old.abort();
        }
    }

    /// Returns true while a callback is waiting to run.
    pub fn is_pending(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for LockoutTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
