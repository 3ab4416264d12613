// src/process/os.rs

//! Real process host backed by `tokio::process`.

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{ReactorError, Result};
use crate::process::{
    ChildFd, ProcessEnded, ProcessHandler, ProcessHost, ProcessTransport, SpawnRequest, STDERR_FD,
    STDOUT_FD,
};

/// Signal names that stop the child. All of them end in a forced kill.
const STOP_SIGNALS: &[&str] = &["KILL", "TERM", "INT"];

/// Transport for a process started by [`OsProcessHost`].
#[derive(Debug)]
pub struct OsTransport {
    pid: Option<u32>,
    kill: Mutex<Option<oneshot::Sender<String>>>,
    ended: Arc<AtomicBool>,
}

impl ProcessTransport for OsTransport {
    fn signal_process(&self, signal: &str) -> Result<()> {
        if self.ended.load(Ordering::SeqCst) {
            return Err(ReactorError::ProcessExitedAlready);
        }
        if !STOP_SIGNALS.contains(&signal) {
            return Err(ReactorError::Unsupported(format!(
                "signal {signal} (only {STOP_SIGNALS:?} are supported)"
            )));
        }

        let sender = self
            .kill
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                info!(pid = ?self.pid, signal, "stopping child process");
                if tx.send(signal.to_string()).is_err() {
                    debug!(pid = ?self.pid, "child already finished while stopping");
                }
            }
            None => debug!(pid = ?self.pid, signal, "stop already requested"),
        }
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// Spawns real processes on the current Tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcessHost;

impl OsProcessHost {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessHost for OsProcessHost {
    type Transport = OsTransport;

    fn spawn(&self, handler: Arc<dyn ProcessHandler>, request: SpawnRequest) -> Result<Arc<OsTransport>> {
        check_supported(&request)?;
        let runtime = Handle::try_current().map_err(|_| ReactorError::NoRuntime)?;

        info!(
            executable = %request.executable,
            args = ?request.args,
            "starting child process"
        );

        let mut child = build_command(&request).spawn()?;
        let pid = child.id();

        let (kill_tx, kill_rx) = oneshot::channel();
        let ended = Arc::new(AtomicBool::new(false));
        let transport = Arc::new(OsTransport {
            pid,
            kill: Mutex::new(Some(kill_tx)),
            ended: Arc::clone(&ended),
        });

        handler.connection_made(transport.clone());

        // Consume both pipes so the child never blocks on a full buffer.
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(runtime.spawn(forward_output(stdout, STDOUT_FD, Arc::clone(&handler))));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(runtime.spawn(forward_output(stderr, STDERR_FD, Arc::clone(&handler))));
        }

        runtime.spawn(supervise(child, kill_rx, readers, handler, ended));
        Ok(transport)
    }
}

fn check_supported(request: &SpawnRequest) -> Result<()> {
    if request.use_pty {
        return Err(ReactorError::Unsupported("pseudo-terminal children".to_string()));
    }
    if let Some(fds) = &request.child_fds {
        for (fd, wiring) in fds {
            let standard = matches!(
                (fd, wiring),
                (0, ChildFd::Write) | (1, ChildFd::Read) | (2, ChildFd::Read)
            );
            if !standard {
                return Err(ReactorError::Unsupported(format!(
                    "child fd {fd} wired as {wiring:?}"
                )));
            }
        }
    }
    Ok(())
}

fn build_command(request: &SpawnRequest) -> Command {
    let mut cmd = Command::new(&request.executable);
    cmd.args(&request.args)
        .env_clear()
        .envs(&request.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(path) = &request.working_path {
        cmd.current_dir(path);
    }

    #[cfg(unix)]
    {
        if let Some(uid) = request.uid {
            cmd.uid(uid);
        }
        if let Some(gid) = request.gid {
            cmd.gid(gid);
        }
    }

    cmd
}

async fn forward_output<R>(mut reader: R, fd: u32, handler: Arc<dyn ProcessHandler>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => handler.child_data_received(fd, &buf[..n]),
            Err(e) => {
                warn!(fd, error = %e, "failed reading child output");
                break;
            }
        }
    }
}

/// Wait for the child to exit (or for a stop request), drain its output,
/// then report the end exactly once.
async fn supervise(
    mut child: Child,
    kill_rx: oneshot::Receiver<String>,
    readers: Vec<JoinHandle<()>>,
    handler: Arc<dyn ProcessHandler>,
    ended: Arc<AtomicBool>,
) {
    let pid = child.id();

    let reason = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => ended_from_status(status),
            Err(e) => {
                error!(?pid, error = %e, "waiting for child process failed");
                ProcessEnded::Terminated { exit_code: None, signal: None }
            }
        },
        Ok(signal) = kill_rx => {
            if let Err(e) = child.kill().await {
                warn!(?pid, error = %e, "failed to kill child process");
            }
            match child.wait().await {
                Ok(status) if status.success() => ProcessEnded::Done,
                _ => ProcessEnded::from_signal(signal),
            }
        }
    };

    for reader in readers {
        let _ = reader.await;
    }

    ended.store(true, Ordering::SeqCst);
    info!(?pid, %reason, "child process ended");
    handler.process_ended(&reason);
}

fn ended_from_status(status: ExitStatus) -> ProcessEnded {
    if let Some(code) = status.code() {
        return ProcessEnded::from_exit_code(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signo) = status.signal() {
            return ProcessEnded::from_signal(signal_name(signo));
        }
    }

    ProcessEnded::Terminated {
        exit_code: None,
        signal: None,
    }
}

#[cfg(unix)]
fn signal_name(signo: i32) -> String {
    match signo {
        1 => "HUP".to_string(),
        2 => "INT".to_string(),
        3 => "QUIT".to_string(),
        9 => "KILL".to_string(),
        15 => "TERM".to_string(),
        other => format!("SIG{other}"),
    }
}
