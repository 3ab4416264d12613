// src/clock/call.rs

//! Scheduled calls and the handles returned to callers.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::clock::virtual_clock::{lock_state, ClockState};
use crate::clock::{Action, Cancellable};
use crate::errors::{ReactorError, Result};
use crate::types::{check_delay, VirtualTime};

/// Position of a call in the pending set: fire time first, then the order in
/// which calls were scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct CallKey {
    pub fire_time: VirtualTime,
    pub sequence: u64,
}

/// A deferred action waiting in a [`VirtualClock`](crate::clock::VirtualClock).
pub(crate) struct ScheduledCall {
    pub key: CallKey,
    pub action: Action,
}

impl fmt::Debug for ScheduledCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledCall")
            .field("fire_time", &self.key.fire_time)
            .field("sequence", &self.key.sequence)
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`VirtualClock::schedule_after`](crate::clock::VirtualClock::schedule_after).
///
/// Holds only a weak reference to the clock, so outliving the clock is fine:
/// every operation then behaves as if the call were already gone.
#[derive(Clone)]
pub struct CallHandle {
    sequence: u64,
    state: Weak<Mutex<ClockState>>,
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("sequence", &self.sequence)
            .field("active", &self.active())
            .finish()
    }
}

impl CallHandle {
    pub(crate) fn new(sequence: u64, state: &Arc<Mutex<ClockState>>) -> Self {
        Self {
            sequence,
            state: Arc::downgrade(state),
        }
    }

    /// Insertion-order number of this call.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the call is due to fire, or `None` once it fired or was cancelled.
    pub fn fire_time(&self) -> Option<VirtualTime> {
        let state = self.state.upgrade()?;
        let guard = lock_state(&state);
        guard.fire_time_of(self.sequence)
    }

    /// Cancel the call. No-op if it already fired or was cancelled.
    pub fn cancel(&self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let removed = lock_state(&state).remove(self.sequence);
        if removed.is_some() {
            debug!(sequence = self.sequence, "scheduled call cancelled");
        }
    }

    /// `true` while the call is pending.
    pub fn active(&self) -> bool {
        self.fire_time().is_some()
    }

    /// Reschedule the call to fire `delay` seconds from the clock's current
    /// time. The call keeps its original place in tie-breaking order.
    pub fn reset(&self, delay: f64) -> Result<()> {
        let delay = check_delay(delay)?;
        self.reschedule(|now, _| now.after(delay))
    }

    /// Push the call's fire time back by `extra` seconds.
    pub fn delay(&self, extra: f64) -> Result<()> {
        let extra = check_delay(extra)?;
        self.reschedule(|_, fire_time| fire_time.after(extra))
    }

    fn reschedule(&self, new_time: impl FnOnce(VirtualTime, VirtualTime) -> VirtualTime) -> Result<()> {
        let state = self.state.upgrade().ok_or(ReactorError::CallNotActive)?;
        let mut guard = lock_state(&state);
        let mut call = guard
            .remove(self.sequence)
            .ok_or(ReactorError::CallNotActive)?;

        let fire_time = new_time(guard.now, call.key.fire_time);
        debug!(
            sequence = self.sequence,
            from = %call.key.fire_time,
            to = %fire_time,
            "scheduled call rescheduled"
        );
        call.key.fire_time = fire_time;
        guard.insert(call);
        Ok(())
    }
}

impl Cancellable for CallHandle {
    fn cancel(&self) {
        CallHandle::cancel(self)
    }

    fn active(&self) -> bool {
        CallHandle::active(self)
    }
}
