// src/clock/virtual_clock.rs

//! Deterministic virtual-time clock.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::clock::call::{CallHandle, CallKey, ScheduledCall};
use crate::clock::Scheduler;
use crate::errors::Result;
use crate::types::{check_advance, check_delay, VirtualTime};

/// Mutable clock state shared between a [`VirtualClock`] and its handles.
#[derive(Debug, Default)]
pub(crate) struct ClockState {
    pub now: VirtualTime,
    next_sequence: u64,
    pending: BTreeMap<CallKey, ScheduledCall>,
    /// sequence -> current fire time, so handles can find their entry.
    index: HashMap<u64, VirtualTime>,
}

impl ClockState {
    fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    pub fn insert(&mut self, call: ScheduledCall) {
        self.index.insert(call.key.sequence, call.key.fire_time);
        self.pending.insert(call.key, call);
    }

    pub fn remove(&mut self, sequence: u64) -> Option<ScheduledCall> {
        let fire_time = self.index.remove(&sequence)?;
        self.pending.remove(&CallKey {
            fire_time,
            sequence,
        })
    }

    pub fn fire_time_of(&self, sequence: u64) -> Option<VirtualTime> {
        self.index.get(&sequence).copied()
    }

    /// Remove and return the earliest call due at or before `now`.
    fn pop_due(&mut self) -> Option<ScheduledCall> {
        let key = *self.pending.keys().next()?;
        if key.fire_time > self.now {
            return None;
        }
        self.remove(key.sequence)
    }
}

pub(crate) fn lock_state(state: &Mutex<ClockState>) -> MutexGuard<'_, ClockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A clock whose time only moves when the test driver calls [`advance`].
///
/// Cloning yields another handle onto the same timeline, so the clock can be
/// captured by scheduled actions that need to schedule follow-up work.
///
/// Calls due at the same instant fire in the order they were scheduled.
///
/// [`advance`]: VirtualClock::advance
#[derive(Clone, Default)]
pub struct VirtualClock {
    state: Arc<Mutex<ClockState>>,
}

impl fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("VirtualClock")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl VirtualClock {
    /// A fresh clock at time zero with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        lock_state(&self.state)
    }

    /// Current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.lock().now
    }

    /// Run `action` once `delay` seconds of virtual time have passed.
    ///
    /// Fails with `InvalidDelay` for negative or non-finite delays; the clock
    /// is left untouched in that case.
    pub fn schedule_after<F>(&self, delay: f64, action: F) -> Result<CallHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = check_delay(delay)?;
        let mut state = self.lock();
        let sequence = state.next_sequence();
        let fire_time = state.now.after(delay);

        state.insert(ScheduledCall {
            key: CallKey {
                fire_time,
                sequence,
            },
            action: Box::new(action),
        });
        drop(state);

        debug!(sequence, delay, %fire_time, "call scheduled");
        Ok(CallHandle::new(sequence, &self.state))
    }

    /// Cancel a pending call. Same as [`CallHandle::cancel`].
    pub fn cancel(&self, handle: &CallHandle) {
        handle.cancel();
    }

    /// Move time forward by `by` seconds and run everything that became due.
    ///
    /// Draining repeats until nothing at or before the new `now` is pending,
    /// so calls scheduled by the actions themselves also run here when they
    /// are due. The clock lock is released while an action runs.
    pub fn advance(&self, by: f64) -> Result<()> {
        let by = check_advance(by)?;
        let now = {
            let mut state = self.lock();
            state.now = state.now.after(by);
            state.now
        };
        debug!(by, %now, "advancing virtual clock");

        let mut fired = 0usize;
        loop {
            let Some(call) = self.lock().pop_due() else {
                break;
            };
            trace!(
                sequence = call.key.sequence,
                fire_time = %call.key.fire_time,
                "firing scheduled call"
            );
            (call.action)();
            fired += 1;
        }

        debug!(fired, pending = self.pending_count(), "virtual clock drained");
        Ok(())
    }

    /// Advance by each amount in turn.
    pub fn pump(&self, steps: &[f64]) -> Result<()> {
        for &by in steps {
            self.advance(by)?;
        }
        Ok(())
    }

    /// Number of calls still waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Seconds until the earliest pending call is due, or `None` when nothing
    /// is pending.
    pub fn timeout(&self) -> Option<f64> {
        let state = self.lock();
        let first = state.pending.keys().next()?;
        Some(first.fire_time.saturating_since(state.now))
    }

    /// Fire times of all pending calls, in the order they would fire.
    pub fn pending_fire_times(&self) -> Vec<VirtualTime> {
        self.lock().pending.keys().map(|k| k.fire_time).collect()
    }
}

impl Scheduler for VirtualClock {
    type Handle = CallHandle;

    fn schedule_after<F>(&self, delay: f64, action: F) -> Result<CallHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        VirtualClock::schedule_after(self, delay, action)
    }

    fn now(&self) -> f64 {
        VirtualClock::now(self).seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReactorError;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce() + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let make = move |label: &'static str| {
            let log = Arc::clone(&log2);
            Box::new(move || log.lock().unwrap().push(label)) as Box<dyn FnOnce() + Send>
        };
        (log, make)
    }

    #[test]
    fn ties_fire_in_scheduling_order() {
        let clock = VirtualClock::new();
        let (log, rec) = recorder();

        clock.schedule_after(5.0, rec("A")).unwrap();
        clock.schedule_after(5.0, rec("B")).unwrap();
        clock.schedule_after(3.0, rec("C")).unwrap();

        clock.advance(5.0).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["C", "A", "B"]);
        assert_eq!(clock.pending_count(), 0);
    }

    #[test]
    fn negative_inputs_leave_state_untouched() {
        let clock = VirtualClock::new();
        assert!(matches!(
            clock.schedule_after(-1.0, || {}),
            Err(ReactorError::InvalidDelay(_))
        ));
        assert!(matches!(clock.advance(-1.0), Err(ReactorError::InvalidAdvance(_))));
        assert_eq!(clock.now(), VirtualTime::ZERO);
        assert_eq!(clock.pending_count(), 0);
    }

    #[test]
    fn cancelled_call_never_runs_and_cancel_is_idempotent() {
        let clock = VirtualClock::new();
        let (log, rec) = recorder();

        let handle = clock.schedule_after(1.0, rec("cancelled")).unwrap();
        clock.schedule_after(1.0, rec("kept")).unwrap();
        clock.cancel(&handle);
        handle.cancel();

        assert_eq!(clock.pending_count(), 1);
        clock.advance(2.0).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);

        // After firing, cancelling is still a no-op.
        handle.cancel();
        assert!(!handle.active());
    }

    #[test]
    fn actions_scheduling_due_work_are_drained_in_same_advance() {
        let clock = VirtualClock::new();
        let (log, rec) = recorder();

        let inner_clock = clock.clone();
        let inner_rec = rec("second");
        let tail_rec = rec("third");
        let outer_log = Arc::clone(&log);
        clock
            .schedule_after(1.0, move || {
                outer_log.lock().unwrap().push("first");
                inner_clock.schedule_after(0.0, inner_rec).unwrap();
                inner_clock.schedule_after(0.5, tail_rec).unwrap();
            })
            .unwrap();
        clock.schedule_after(1.0, rec("sibling")).unwrap();

        clock.advance(2.0).unwrap();

        // `second` fires at t=1 with a later sequence than `sibling`.
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first", "sibling", "second", "third"]
        );
        assert_eq!(clock.timeout(), None);
    }

    #[test]
    fn work_scheduled_beyond_now_stays_pending() {
        let clock = VirtualClock::new();
        let (log, rec) = recorder();

        let inner_clock = clock.clone();
        let later = rec("later");
        clock
            .schedule_after(1.0, move || {
                inner_clock.schedule_after(5.0, later).unwrap();
            })
            .unwrap();

        clock.advance(1.0).unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(clock.pending_count(), 1);
        assert_eq!(clock.timeout(), Some(5.0));

        clock.advance(5.0).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["later"]);
    }

    #[test]
    fn reset_and_delay_move_fire_time() {
        let clock = VirtualClock::new();
        let (log, rec) = recorder();

        let handle = clock.schedule_after(1.0, rec("moved")).unwrap();
        clock.advance(0.5).unwrap();
        handle.reset(2.0).unwrap();
        assert_eq!(handle.fire_time().map(VirtualTime::seconds), Some(2.5));

        handle.delay(1.0).unwrap();
        assert_eq!(handle.fire_time().map(VirtualTime::seconds), Some(3.5));

        clock.advance(2.0).unwrap();
        assert!(log.lock().unwrap().is_empty());
        clock.advance(1.0).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["moved"]);

        assert!(matches!(handle.reset(1.0), Err(ReactorError::CallNotActive)));
    }

    #[test]
    fn pump_advances_step_by_step() {
        let clock = VirtualClock::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for delay in [1.0, 2.0, 3.0] {
            let seen = Arc::clone(&seen);
            let inner = clock.clone();
            clock
                .schedule_after(delay, move || seen.lock().unwrap().push(inner.now().seconds()))
                .unwrap();
        }

        clock.pump(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(clock.now().seconds(), 3.0);
    }

    #[test]
    fn handle_outliving_clock_is_inert() {
        let clock = VirtualClock::new();
        let handle = clock.schedule_after(1.0, || {}).unwrap();
        drop(clock);

        handle.cancel();
        assert!(!handle.active());
        assert!(matches!(handle.delay(1.0), Err(ReactorError::CallNotActive)));
    }
}
