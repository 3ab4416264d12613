// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReactorError {
    #[error("invalid delay: {0} (must be a finite, non-negative number of seconds)")]
    InvalidDelay(f64),

    #[error("invalid advance: {0} (must be a finite, non-negative number of seconds)")]
    InvalidAdvance(f64),

    #[error("future value already resolved")]
    AlreadyResolved,

    #[error("poll predicate failed: {0:#}")]
    PredicateFailed(anyhow::Error),

    #[error("scheduled call is no longer active (already fired or cancelled)")]
    CallNotActive,

    #[error("transport was not created by this process host")]
    UnknownTransport,

    #[error("process has already exited")]
    ProcessExitedAlready,

    #[error("process terminated (exit code {exit_code:?}, signal {signal:?})")]
    ProcessTerminated {
        exit_code: Option<i32>,
        signal: Option<String>,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("no tokio runtime available for the real scheduler or process host")]
    NoRuntime,

    #[error("Scenario error: {0}")]
    ScenarioError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ReactorError>;
