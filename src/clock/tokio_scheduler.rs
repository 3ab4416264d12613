// src/clock/tokio_scheduler.rs

//! Real-time scheduler backed by `tokio::time`.
//!
//! This is what production code schedules against. Every call becomes a
//! Tokio task that sleeps for the delay and then runs the action, so a
//! current Tokio runtime is required.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::clock::{Cancellable, Scheduler};
use crate::errors::{ReactorError, Result};
use crate::types::check_delay;

#[derive(Debug, Clone, Copy)]
pub struct TokioScheduler {
    origin: Instant,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a call scheduled on a [`TokioScheduler`].
#[derive(Debug, Clone)]
pub struct TokioCallHandle {
    abort: AbortHandle,
}

impl Cancellable for TokioCallHandle {
    fn cancel(&self) {
        // Aborting a finished task is a no-op.
        self.abort.abort();
    }

    fn active(&self) -> bool {
        !self.abort.is_finished()
    }
}

impl Scheduler for TokioScheduler {
    type Handle = TokioCallHandle;

    fn schedule_after<F>(&self, delay: f64, action: F) -> Result<TokioCallHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = check_delay(delay)?;
        let runtime = Handle::try_current().map_err(|_| ReactorError::NoRuntime)?;

        let task = runtime.spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
            action();
        });

        debug!(delay, "call scheduled on tokio runtime");
        Ok(TokioCallHandle {
            abort: task.abort_handle(),
        })
    }

    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn scheduling_outside_a_runtime_fails() {
        let scheduler = TokioScheduler::new();
        let result = scheduler.schedule_after(1.0, || {});
        assert!(matches!(result, Err(ReactorError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_call_does_not_run() {
        let scheduler = TokioScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = Arc::clone(&hits);
        let cancelled = scheduler
            .schedule_after(1.0, move || {
                h1.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let h2 = Arc::clone(&hits);
        let kept = scheduler
            .schedule_after(1.0, move || {
                h2.fetch_add(10, Ordering::SeqCst);
            })
            .unwrap();

        cancelled.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert!(!kept.active());
    }
}
