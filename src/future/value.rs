// src/future/value.rs

use std::fmt;
use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::trace;

use crate::errors::{ReactorError, Result};

/// What a continuation receives once the value is produced.
pub type Outcome<T, E> = std::result::Result<Arc<T>, Arc<E>>;
type Continuation<T, E> = Box<dyn FnOnce(Outcome<T, E>) + Send>;

enum Slot<T, E> {
    Pending(Vec<Continuation<T, E>>),
    Succeeded(Arc<T>),
    Failed(Arc<E>),
}

/// Observable state of a [`FutureValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    Pending,
    Succeeded,
    Failed,
}

/// A result that may not be available yet.
///
/// Clones share the same slot. The slot moves from `Pending` to either
/// `Succeeded` or `Failed` exactly once.
pub struct FutureValue<T, E = ReactorError> {
    slot: Arc<Mutex<Slot<T, E>>>,
}

impl<T, E> Clone for FutureValue<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, E> fmt::Debug for FutureValue<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let state = match &*guard {
            Slot::Pending(queue) => format!("Pending({} continuations)", queue.len()),
            Slot::Succeeded(_) => "Succeeded".to_string(),
            Slot::Failed(_) => "Failed".to_string(),
        };
        f.debug_struct("FutureValue").field("state", &state).finish()
    }
}

impl<T, E> Default for FutureValue<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> FutureValue<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// A pending future value.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Pending(Vec::new()))),
        }
    }

    /// An already-succeeded future value.
    pub fn succeeded(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Succeeded(Arc::new(value)))),
        }
    }

    /// An already-failed future value.
    pub fn failed(error: E) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Failed(Arc::new(error)))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T, E>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> FutureState {
        match &*self.lock() {
            Slot::Pending(_) => FutureState::Pending,
            Slot::Succeeded(_) => FutureState::Succeeded,
            Slot::Failed(_) => FutureState::Failed,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == FutureState::Pending
    }

    /// The success value, if the future has succeeded.
    pub fn value(&self) -> Option<Arc<T>> {
        match &*self.lock() {
            Slot::Succeeded(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }

    /// The failure, if the future has failed.
    pub fn error(&self) -> Option<Arc<E>> {
        match &*self.lock() {
            Slot::Failed(e) => Some(Arc::clone(e)),
            _ => None,
        }
    }

    /// Produce the success value and run every queued continuation.
    pub fn resolve(&self, value: T) -> Result<()> {
        let value = Arc::new(value);
        let queue = self.settle(Slot::Succeeded(Arc::clone(&value)))?;
        trace!(continuations = queue.len(), "future value resolved");
        for continuation in queue {
            continuation(Ok(Arc::clone(&value)));
        }
        Ok(())
    }

    /// Produce a failure and run every queued continuation.
    pub fn fail(&self, error: E) -> Result<()> {
        let error = Arc::new(error);
        let queue = self.settle(Slot::Failed(Arc::clone(&error)))?;
        trace!(continuations = queue.len(), "future value failed");
        for continuation in queue {
            continuation(Err(Arc::clone(&error)));
        }
        Ok(())
    }

    /// Swap in the final slot and hand back the queued continuations. The
    /// lock is released before any continuation runs, so continuations may
    /// touch this future again.
    fn settle(&self, done: Slot<T, E>) -> Result<Vec<Continuation<T, E>>> {
        let mut guard = self.lock();
        if !matches!(&*guard, Slot::Pending(_)) {
            return Err(ReactorError::AlreadyResolved);
        }
        match mem::replace(&mut *guard, done) {
            Slot::Pending(queue) => Ok(queue),
            _ => Err(ReactorError::AlreadyResolved),
        }
    }

    fn subscribe(&self, continuation: Continuation<T, E>) {
        let ready = {
            let mut guard = self.lock();
            match &mut *guard {
                Slot::Pending(queue) => {
                    queue.push(continuation);
                    return;
                }
                Slot::Succeeded(v) => Ok(Arc::clone(v)),
                Slot::Failed(e) => Err(Arc::clone(e)),
            }
        };
        continuation(ready);
    }

    /// Register continuations.
    ///
    /// If the future is already resolved, the matching continuation runs
    /// before this returns; otherwise it runs at resolution time.
    pub fn on_complete<S, F>(&self, on_success: S, on_failure: F)
    where
        S: FnOnce(&T) + Send + 'static,
        F: FnOnce(&E) + Send + 'static,
    {
        self.subscribe(Box::new(move |outcome| match outcome {
            Ok(v) => on_success(&v),
            Err(e) => on_failure(&e),
        }));
    }

    /// Await the outcome from async code.
    ///
    /// If every producer drops the future while it is still pending, the
    /// returned future never completes; wrap it in a timeout.
    pub fn wait(&self) -> impl Future<Output = Outcome<T, E>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.subscribe(Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }));

        async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => std::future::pending().await,
            }
        }
    }
}
