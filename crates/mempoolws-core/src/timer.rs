//! One-shot deferred action.

use std::time::Duration;

use tokio::task::JoinHandle;

/// A closure scheduled to run once after a delay on the Tokio runtime.
///
/// Dropping the handle does not cancel the action; only [`OneShotTimer::cancel`]
/// does.
#[derive(Debug)]
pub struct OneShotTimer {
    delay: Duration,
    handle: JoinHandle<()>,
}

impl OneShotTimer {
    /// Schedule `action` to run after `delay` on the current runtime.
    ///
    /// Returns `None` (and drops `action`) when called outside a Tokio
    /// runtime.
    pub fn schedule<F>(delay: Duration, action: F) -> Option<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });
        Some(Self { delay, handle })
    }

    /// The delay the action was scheduled with.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns `true` once the action has run (or was cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Prevent the action from running if it has not run yet.
    pub fn cancel(self) {
        self.handle.abort();
    }
}
