// src/process/fake.rs

//! In-memory process host for tests.
//!
//! `FakeProcessHost` never starts a real process. Each `spawn` builds a
//! [`FakeTransport`], appends a [`ProcessRecord`] to an inspection log and
//! notifies the handler, all before returning. Signals are recorded on the
//! transport. Output and exit are injected by the driver with
//! [`FakeProcessHost::deliver_output`] and [`FakeProcessHost::end_process`].
//!
//! The host is also a scheduler: it owns a [`VirtualClock`] and delegates
//! `schedule_after`/`advance` to it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::clock::{CallHandle, Scheduler, VirtualClock};
use crate::errors::{ReactorError, Result};
use crate::process::{
    is_same_transport, ProcessEnded, ProcessHandler, ProcessHost, ProcessTransport, SpawnRequest,
};

/// Fake pids start here so they never look like pid 0 or 1.
const FAKE_PID_BASE: u32 = 10_000;

/// Stand-in process handle that records signals instead of delivering them.
#[derive(Debug)]
pub struct FakeTransport {
    pid: u32,
    signals: Mutex<Vec<String>>,
    ended: Mutex<Option<ProcessEnded>>,
}

impl FakeTransport {
    fn new(pid: u32) -> Self {
        Self {
            pid,
            signals: Mutex::new(Vec::new()),
            ended: Mutex::new(None),
        }
    }

    /// Signals requested so far, in order.
    pub fn signals(&self) -> Vec<String> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How the process ended, once the driver has ended it.
    pub fn ended(&self) -> Option<ProcessEnded> {
        self.ended
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn mark_ended(&self, reason: ProcessEnded) -> Result<()> {
        let mut ended = self.ended.lock().unwrap_or_else(PoisonError::into_inner);
        if ended.is_some() {
            return Err(ReactorError::ProcessExitedAlready);
        }
        *ended = Some(reason);
        Ok(())
    }
}

impl ProcessTransport for FakeTransport {
    fn signal_process(&self, signal: &str) -> Result<()> {
        debug!(pid = self.pid, signal, "recording signal for fake process");
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signal.to_string());
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }
}

/// One `spawn` call: the handler, the request, and the transport that was
/// both returned to the caller and passed to `connection_made`.
#[derive(Clone)]
pub struct ProcessRecord {
    pub handler: Arc<dyn ProcessHandler>,
    pub request: SpawnRequest,
    pub transport: Arc<FakeTransport>,
}

impl fmt::Debug for ProcessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRecord")
            .field("request", &self.request)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
pub struct FakeProcessHost {
    clock: VirtualClock,
    processes: Arc<Mutex<Vec<ProcessRecord>>>,
}

impl fmt::Debug for FakeProcessHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeProcessHost")
            .field("clock", &self.clock)
            .field("processes", &self.lock().len())
            .finish()
    }
}

impl FakeProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host sharing an existing clock.
    pub fn with_clock(clock: VirtualClock) -> Self {
        Self {
            clock,
            processes: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProcessRecord>> {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Advance the underlying clock.
    pub fn advance(&self, by: f64) -> Result<()> {
        self.clock.advance(by)
    }

    /// Seconds until the next pending call, if any.
    pub fn timeout(&self) -> Option<f64> {
        self.clock.timeout()
    }

    /// Emulate spawning a process. Never fails.
    pub fn spawn(&self, handler: Arc<dyn ProcessHandler>, request: SpawnRequest) -> Arc<FakeTransport> {
        let transport = {
            let mut processes = self.lock();
            let pid = FAKE_PID_BASE + processes.len() as u32;
            let transport = Arc::new(FakeTransport::new(pid));
            processes.push(ProcessRecord {
                handler: Arc::clone(&handler),
                request: request.clone(),
                transport: Arc::clone(&transport),
            });
            transport
        };

        info!(
            pid = transport.pid,
            executable = %request.executable,
            args = ?request.args,
            "fake process spawned"
        );

        handler.connection_made(transport.clone());
        transport
    }

    /// Record `signal` on `transport`. Nothing is delivered.
    pub fn signal(&self, transport: &FakeTransport, signal: &str) {
        // Recording a signal on a fake transport cannot fail.
        let _ = transport.signal_process(signal);
    }

    /// Every spawn so far, oldest first.
    pub fn records(&self) -> Vec<ProcessRecord> {
        self.lock().clone()
    }

    /// The record whose transport is `transport`.
    pub fn record_for<T: ?Sized>(&self, transport: &Arc<T>) -> Option<ProcessRecord> {
        self.lock()
            .iter()
            .find(|record| is_same_transport(&record.transport, transport))
            .cloned()
    }

    /// Deliver child output to the process's handler.
    pub fn deliver_output(&self, transport: &Arc<FakeTransport>, fd: u32, data: &[u8]) -> Result<()> {
        let record = self
            .record_for(transport)
            .ok_or(ReactorError::UnknownTransport)?;
        if record.transport.ended().is_some() {
            return Err(ReactorError::ProcessExitedAlready);
        }

        debug!(pid = transport.pid, fd, bytes = data.len(), "delivering fake process output");
        record.handler.child_data_received(fd, data);
        Ok(())
    }

    /// End the process and notify its handler.
    pub fn end_process(&self, transport: &Arc<FakeTransport>, reason: ProcessEnded) -> Result<()> {
        let record = self
            .record_for(transport)
            .ok_or(ReactorError::UnknownTransport)?;
        record.transport.mark_ended(reason.clone())?;

        info!(pid = transport.pid, %reason, "fake process ended");
        record.handler.process_ended(&reason);
        Ok(())
    }
}

impl ProcessHost for FakeProcessHost {
    type Transport = FakeTransport;

    fn spawn(&self, handler: Arc<dyn ProcessHandler>, request: SpawnRequest) -> Result<Arc<FakeTransport>> {
        Ok(FakeProcessHost::spawn(self, handler, request))
    }
}

impl Scheduler for FakeProcessHost {
    type Handle = CallHandle;

    fn schedule_after<F>(&self, delay: f64, action: F) -> Result<CallHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.clock.schedule_after(delay, action)
    }

    fn now(&self) -> f64 {
        self.clock.now().seconds()
    }
}
