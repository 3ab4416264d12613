// src/poll/mod.rs

//! Poll a condition until it yields a value.
//!
//! The predicate reports "not yet" with `Ok(None)` and success with
//! `Ok(Some(value))`. Retries go through any [`Scheduler`], so under a
//! [`VirtualClock`](crate::clock::VirtualClock) the test driver forces each
//! re-check by advancing virtual time.
//!
//! There is no attempt limit and no timeout. A caller that needs a deadline
//! schedules its own competing failure on the returned [`FutureValue`]; once
//! the value is settled, no further attempt runs.

use tracing::{debug, trace, warn};

use crate::clock::Scheduler;
use crate::errors::{ReactorError, Result};
use crate::future::FutureValue;

/// Interval used by [`loop_until`], in seconds.
pub const DEFAULT_POLL_INTERVAL: f64 = 0.1;

struct PollState<S, P, T> {
    scheduler: S,
    predicate: P,
    interval: f64,
    attempts: u64,
    result: FutureValue<T>,
}

/// Call `predicate` now and then every `interval` seconds until it returns
/// `Some`. A predicate error fails the returned value and stops polling.
pub fn poll_until<S, P, T>(scheduler: &S, predicate: P, interval: f64) -> FutureValue<T>
where
    S: Scheduler + Clone + 'static,
    P: FnMut() -> anyhow::Result<Option<T>> + Send + 'static,
    T: Send + Sync + 'static,
{
    let result = FutureValue::new();
    let state = PollState {
        scheduler: scheduler.clone(),
        predicate,
        interval,
        attempts: 0,
        result: result.clone(),
    };
    attempt(state);
    result
}

/// [`poll_until`] with [`DEFAULT_POLL_INTERVAL`].
pub fn loop_until<S, P, T>(scheduler: &S, predicate: P) -> FutureValue<T>
where
    S: Scheduler + Clone + 'static,
    P: FnMut() -> anyhow::Result<Option<T>> + Send + 'static,
    T: Send + Sync + 'static,
{
    poll_until(scheduler, predicate, DEFAULT_POLL_INTERVAL)
}

fn attempt<S, P, T>(mut state: PollState<S, P, T>)
where
    S: Scheduler + Clone + 'static,
    P: FnMut() -> anyhow::Result<Option<T>> + Send + 'static,
    T: Send + Sync + 'static,
{
    if !state.result.is_pending() {
        debug!(attempts = state.attempts, "poll result settled elsewhere; stopping");
        return;
    }

    state.attempts += 1;
    let attempts = state.attempts;

    match (state.predicate)() {
        Ok(Some(value)) => {
            debug!(attempts, "poll condition satisfied");
            settle(attempts, state.result.resolve(value));
        }
        Err(err) => {
            debug!(attempts, error = %err, "poll predicate failed; giving up");
            settle(attempts, state.result.fail(ReactorError::PredicateFailed(err)));
        }
        Ok(None) => {
            trace!(attempts, interval = state.interval, "poll condition not met; retrying");
            let scheduler = state.scheduler.clone();
            let interval = state.interval;
            let result = state.result.clone();
            if let Err(err) = scheduler.schedule_after(interval, move || attempt(state)) {
                settle(attempts, result.fail(err));
            }
        }
    }
}

/// The predicate itself may settle the result; the poll's own outcome is
/// then discarded, and logged.
fn settle(attempts: u64, outcome: Result<()>) {
    if let Err(err) = outcome {
        warn!(attempts, error = %err, "poll outcome dropped: result already settled");
    }
}
