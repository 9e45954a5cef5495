use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::Instrument;

/// One-shot timer running a callback on the tokio runtime.
///
/// Cancelling before the deadline guarantees the callback never runs.
/// A callback that already started is not interrupted; callers make it
/// idempotent instead.
#[derive(Debug)]
pub struct AckTimer {
    handle: AbortHandle,
}

impl AckTimer {
    /// Start the timer. Must be called from within a tokio runtime.
    pub fn start<F>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let task = tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                on_fire();
            }
            .in_current_span(),
        );
        Self {
            handle: task.abort_handle(),
        }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
