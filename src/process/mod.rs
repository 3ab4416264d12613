// src/process/mod.rs

//! Process spawning layer.
//!
//! Consumer code talks to a [`ProcessHost`] and receives lifecycle and I/O
//! notifications through a [`ProcessHandler`]:
//!
//! - [`os`] spawns real processes with `tokio::process::Command`.
//! - [`fake`] records spawn requests and signals without touching the OS;
//!   the test driver injects output and exits by hand.
//! - [`capture`] is a ready-made handler that collects stdout into a
//!   [`FutureValue`](crate::future::FutureValue).
//!
//! In both hosts `connection_made` runs before `spawn` returns, so the
//! transport is usable as soon as the caller sees it.

pub mod capture;
pub mod fake;
pub mod os;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::Result;

pub use capture::{capture_output, CaptureHandler};
pub use fake::{FakeProcessHost, FakeTransport, ProcessRecord};
pub use os::{OsProcessHost, OsTransport};

/// File descriptor number of the child's standard output.
pub const STDOUT_FD: u32 = 1;
/// File descriptor number of the child's standard error.
pub const STDERR_FD: u32 = 2;

/// How a child file descriptor is wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildFd {
    /// The parent reads what the child writes.
    Read,
    /// The parent writes what the child reads.
    Write,
    /// The child inherits the given parent descriptor.
    Inherit(u32),
}

/// Everything a caller passes when spawning a process.
///
/// `args` does not include the program name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpawnRequest {
    pub executable: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_path: Option<PathBuf>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub use_pty: bool,
    pub child_fds: Option<BTreeMap<u32, ChildFd>>,
}

impl SpawnRequest {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_path = Some(path.into());
        self
    }

    pub fn uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }

    pub fn use_pty(mut self, use_pty: bool) -> Self {
        self.use_pty = use_pty;
        self
    }

    pub fn child_fd(mut self, fd: u32, wiring: ChildFd) -> Self {
        self.child_fds.get_or_insert_with(BTreeMap::new).insert(fd, wiring);
        self
    }
}

/// Why a process stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEnded {
    /// Exited with status 0.
    Done,
    /// Exited with a non-zero status or was killed by a signal.
    Terminated {
        exit_code: Option<i32>,
        signal: Option<String>,
    },
}

impl ProcessEnded {
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            ProcessEnded::Done
        } else {
            ProcessEnded::Terminated {
                exit_code: Some(code),
                signal: None,
            }
        }
    }

    pub fn from_signal(signal: impl Into<String>) -> Self {
        ProcessEnded::Terminated {
            exit_code: None,
            signal: Some(signal.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessEnded::Done)
    }
}

impl fmt::Display for ProcessEnded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessEnded::Done => write!(f, "exited with status 0"),
            ProcessEnded::Terminated {
                exit_code: Some(code),
                ..
            } => write!(f, "exited with status {code}"),
            ProcessEnded::Terminated {
                signal: Some(signal),
                ..
            } => write!(f, "killed by signal {signal}"),
            ProcessEnded::Terminated { .. } => write!(f, "terminated"),
        }
    }
}

/// Handle to a running (or emulated) process.
pub trait ProcessTransport: Send + Sync + fmt::Debug {
    /// Ask for `signal` (e.g. `"TERM"`, `"KILL"`) to be sent to the process.
    fn signal_process(&self, signal: &str) -> Result<()>;

    /// OS process id, if one exists.
    fn pid(&self) -> Option<u32>;
}

/// Receives lifecycle and I/O notifications for one spawned process.
pub trait ProcessHandler: Send + Sync {
    /// The process exists and `transport` is ready for use.
    fn connection_made(&self, transport: Arc<dyn ProcessTransport>);

    /// The child wrote `data` on descriptor `fd`.
    fn child_data_received(&self, _fd: u32, _data: &[u8]) {}

    /// The process is gone. Called once, after all output was delivered.
    fn process_ended(&self, _reason: &ProcessEnded) {}
}

/// "Spawn this program and tell me about its lifecycle and I/O."
pub trait ProcessHost {
    type Transport: ProcessTransport + 'static;

    fn spawn(
        &self,
        handler: Arc<dyn ProcessHandler>,
        request: SpawnRequest,
    ) -> Result<Arc<Self::Transport>>;
}

/// `true` if both handles point at the same transport object.
pub fn is_same_transport<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
