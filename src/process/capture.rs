// src/process/capture.rs

//! A handler that captures a child's stdout.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::errors::ReactorError;
use crate::future::FutureValue;
use crate::process::{ProcessEnded, ProcessHandler, ProcessTransport, STDOUT_FD};

/// Collects stdout and settles a [`FutureValue`] when the process ends:
/// with the bytes on a clean exit, with `ProcessTerminated` otherwise.
/// Stderr is logged at debug level and otherwise dropped.
#[derive(Debug, Default)]
pub struct CaptureHandler {
    stdout: Mutex<Vec<u8>>,
    result: FutureValue<Vec<u8>>,
}

impl CaptureHandler {
    /// Stdout bytes captured so far. Still available after the process
    /// ended.
    pub fn captured(&self) -> Vec<u8> {
        self.stdout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProcessHandler for CaptureHandler {
    fn connection_made(&self, transport: Arc<dyn ProcessTransport>) {
        debug!(pid = ?transport.pid(), "capturing process output");
    }

    fn child_data_received(&self, fd: u32, data: &[u8]) {
        if fd == STDOUT_FD {
            self.stdout
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(data);
        } else {
            debug!(fd, "ignored output: {}", String::from_utf8_lossy(data).trim_end());
        }
    }

    fn process_ended(&self, reason: &ProcessEnded) {
        let settled = match reason {
            ProcessEnded::Done => self.result.resolve(self.captured()),
            ProcessEnded::Terminated { exit_code, signal } => {
                self.result.fail(ReactorError::ProcessTerminated {
                    exit_code: *exit_code,
                    signal: signal.clone(),
                })
            }
        };
        // Only the first process to end settles the value; a handler shared
        // between spawns reports the later ones here.
        if let Err(err) = settled {
            warn!(%reason, error = %err, "capture result already settled; end ignored");
        }
    }
}

/// A fresh capture handler plus the value it will settle.
pub fn capture_output() -> (FutureValue<Vec<u8>>, Arc<CaptureHandler>) {
    let handler = Arc::new(CaptureHandler::default());
    (handler.result.clone(), handler)
}
