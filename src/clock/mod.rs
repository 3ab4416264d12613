// src/clock/mod.rs

//! Scheduling primitives.
//!
//! Consumer code schedules work through the [`Scheduler`] trait:
//! - [`VirtualClock`] is the deterministic implementation used by tests.
//!   Time only moves when the driver calls [`VirtualClock::advance`].
//! - [`TokioScheduler`] is the production implementation backed by
//!   `tokio::time`.
//!
//! Both accept delays as `f64` seconds and return a handle implementing
//! [`Cancellable`].

pub mod call;
pub mod tokio_scheduler;
pub mod virtual_clock;

use crate::errors::Result;

pub use call::CallHandle;
pub use tokio_scheduler::{TokioCallHandle, TokioScheduler};
pub use virtual_clock::VirtualClock;

/// A deferred zero-argument callback.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled call that can be cancelled.
pub trait Cancellable {
    /// Cancel the call. Cancelling a call that already fired, or was already
    /// cancelled, is a no-op.
    fn cancel(&self);

    /// `true` while the call is still waiting to fire.
    fn active(&self) -> bool;
}

/// "Run this callback after N seconds."
pub trait Scheduler: Send + Sync {
    type Handle: Cancellable + Send;

    fn schedule_after<F>(&self, delay: f64, action: F) -> Result<Self::Handle>
    where
        F: FnOnce() + Send + 'static;

    /// Seconds elapsed on this scheduler's timeline.
    fn now(&self) -> f64;
}
