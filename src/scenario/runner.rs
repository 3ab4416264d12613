// src/scenario/runner.rs

//! Runs a validated [`Scenario`] on a fresh [`FakeProcessHost`].
//!
//! Execution is fully synchronous and deterministic: the same scenario always
//! produces the same trace.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::clock::{CallHandle, VirtualClock};
use crate::errors::{ReactorError, Result};
use crate::future::FutureValue;
use crate::poll::poll_until;
use crate::process::{
    FakeProcessHost, FakeTransport, ProcessEnded, ProcessHandler, ProcessTransport, SpawnRequest,
};
use crate::scenario::model::{Scenario, Step};

/// Something observable that happened while running a scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Fired { label: String, at: f64 },
    Cancelled { label: String },
    Advanced { to: f64 },
    Spawned { process: String, pid: Option<u32> },
    Signalled { process: String, signal: String },
    Output { process: String, fd: u32, data: String },
    Exited { process: String, reason: ProcessEnded },
    PollResolved { label: String, attempts: u32, at: f64 },
    PollFailed { label: String, error: String },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Fired { label, at } => write!(f, "[{at}] fired {label}"),
            TraceEvent::Cancelled { label } => write!(f, "cancelled {label}"),
            TraceEvent::Advanced { to } => write!(f, "[{to}] clock advanced"),
            TraceEvent::Spawned { process, pid } => match pid {
                Some(pid) => write!(f, "spawned {process} (pid {pid})"),
                None => write!(f, "spawned {process}"),
            },
            TraceEvent::Signalled { process, signal } => {
                write!(f, "signalled {process} with {signal}")
            }
            TraceEvent::Output { process, fd, data } => {
                write!(f, "{process} wrote {data:?} on fd {fd}")
            }
            TraceEvent::Exited { process, reason } => write!(f, "{process} {reason}"),
            TraceEvent::PollResolved {
                label,
                attempts,
                at,
            } => write!(f, "[{at}] poll {label} resolved after {attempts} attempts"),
            TraceEvent::PollFailed { label, error } => write!(f, "poll {label} failed: {error}"),
        }
    }
}

type Trace = Arc<Mutex<Vec<TraceEvent>>>;

fn record(trace: &Trace, event: TraceEvent) {
    debug!(%event, "trace");
    trace
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(event);
}

/// Forwards process notifications into the trace under a scenario name.
struct TraceHandler {
    process: String,
    trace: Trace,
}

impl ProcessHandler for TraceHandler {
    fn connection_made(&self, transport: Arc<dyn ProcessTransport>) {
        record(
            &self.trace,
            TraceEvent::Spawned {
                process: self.process.clone(),
                pid: transport.pid(),
            },
        );
    }

    fn child_data_received(&self, fd: u32, data: &[u8]) {
        record(
            &self.trace,
            TraceEvent::Output {
                process: self.process.clone(),
                fd,
                data: String::from_utf8_lossy(data).into_owned(),
            },
        );
    }

    fn process_ended(&self, reason: &ProcessEnded) {
        record(
            &self.trace,
            TraceEvent::Exited {
                process: self.process.clone(),
                reason: reason.clone(),
            },
        );
    }
}

/// Mutable state while stepping through a scenario.
#[derive(Debug)]
pub struct ScenarioRunner {
    host: FakeProcessHost,
    default_interval: f64,
    trace: Trace,
    calls: HashMap<String, CallHandle>,
    processes: HashMap<String, Arc<FakeTransport>>,
    polls: HashMap<String, FutureValue<u32>>,
}

impl ScenarioRunner {
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            host: FakeProcessHost::new(),
            default_interval: scenario.scenario.poll_interval,
            trace: Arc::default(),
            calls: HashMap::new(),
            processes: HashMap::new(),
            polls: HashMap::new(),
        }
    }

    pub fn host(&self) -> &FakeProcessHost {
        &self.host
    }

    fn clock(&self) -> &VirtualClock {
        self.host.clock()
    }

    /// Trace recorded so far.
    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Polls that have not resolved yet, by label.
    pub fn pending_polls(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .polls
            .iter()
            .filter(|(_, fv)| fv.is_pending())
            .map(|(label, _)| label.clone())
            .collect();
        labels.sort();
        labels
    }

    /// Apply a single step.
    pub fn step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Schedule { label, delay } => {
                let trace = Arc::clone(&self.trace);
                let clock = self.clock().clone();
                let fired = label.clone();
                let handle = self.clock().schedule_after(*delay, move || {
                    record(
                        &trace,
                        TraceEvent::Fired {
                            label: fired,
                            at: clock.now().seconds(),
                        },
                    );
                })?;
                self.calls.insert(label.clone(), handle);
            }
            Step::Cancel { label } => {
                let handle = self.calls.get(label).ok_or_else(|| unknown("label", label))?;
                if handle.active() {
                    handle.cancel();
                    record(
                        &self.trace,
                        TraceEvent::Cancelled {
                            label: label.clone(),
                        },
                    );
                }
            }
            Step::Advance { by } => {
                self.host.advance(*by)?;
                record(
                    &self.trace,
                    TraceEvent::Advanced {
                        to: self.clock().now().seconds(),
                    },
                );
            }
            Step::Spawn {
                name,
                executable,
                args,
                env,
                path,
            } => {
                let mut request = SpawnRequest::new(executable.clone()).args(args.iter().cloned());
                request.env = env.clone();
                request.working_path = path.clone();

                let handler = Arc::new(TraceHandler {
                    process: name.clone(),
                    trace: Arc::clone(&self.trace),
                });
                let transport = self.host.spawn(handler, request);
                self.processes.insert(name.clone(), transport);
            }
            Step::Signal { process, signal } => {
                let transport = self.transport(process)?;
                self.host.signal(&transport, signal);
                record(
                    &self.trace,
                    TraceEvent::Signalled {
                        process: process.clone(),
                        signal: signal.clone(),
                    },
                );
            }
            Step::Output { process, fd, data } => {
                let transport = self.transport(process)?;
                self.host.deliver_output(&transport, *fd, data.as_bytes())?;
            }
            Step::Exit { process, code } => {
                let transport = self.transport(process)?;
                self.host
                    .end_process(&transport, ProcessEnded::from_exit_code(*code))?;
            }
            Step::Poll {
                label,
                ready_after,
                interval,
            } => self.start_poll(label, *ready_after, interval.unwrap_or(self.default_interval)),
        }
        Ok(())
    }

    fn transport(&self, process: &str) -> Result<Arc<FakeTransport>> {
        self.processes
            .get(process)
            .cloned()
            .ok_or_else(|| unknown("process", process))
    }

    fn start_poll(&mut self, label: &str, ready_after: u32, interval: f64) {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let fv = poll_until(
            &self.host,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((n > ready_after).then_some(n))
            },
            interval,
        );

        let trace_ok = Arc::clone(&self.trace);
        let trace_err = Arc::clone(&self.trace);
        let clock = self.clock().clone();
        let ok_label = label.to_string();
        let err_label = label.to_string();
        fv.on_complete(
            move |n| {
                record(
                    &trace_ok,
                    TraceEvent::PollResolved {
                        label: ok_label,
                        attempts: *n,
                        at: clock.now().seconds(),
                    },
                )
            },
            move |e| {
                record(
                    &trace_err,
                    TraceEvent::PollFailed {
                        label: err_label,
                        error: e.to_string(),
                    },
                )
            },
        );
        self.polls.insert(label.to_string(), fv);
    }
}

fn unknown(kind: &str, name: &str) -> ReactorError {
    ReactorError::ScenarioError(format!("unknown {kind} '{name}'"))
}

/// Run every step of `scenario` and return the full trace.
pub fn run_scenario(scenario: &Scenario) -> Result<Vec<TraceEvent>> {
    info!(
        name = %scenario.scenario.name,
        steps = scenario.steps.len(),
        "running scenario"
    );

    let mut runner = ScenarioRunner::new(scenario);
    for step in &scenario.steps {
        runner.step(step)?;
    }

    let pending = runner.pending_polls();
    if !pending.is_empty() {
        info!(?pending, "scenario finished with unresolved polls");
    }
    info!(
        pending_calls = runner.host().clock().pending_count(),
        "scenario finished"
    );
    Ok(runner.trace())
}
