// src/logging.rs

//! Subscriber setup for the `vreactor` binary.
//!
//! The library only emits `tracing` events: `info` for spawns, process ends
//! and scenario start/finish; `debug` for scheduling, cancellation, drains
//! and poll outcomes; `trace` for every fired call and poll retry. Tests
//! install their own subscriber through `vreactor-test-utils`.
//!
//! Level, first match wins:
//! 1. `--log-level`
//! 2. `VREACTOR_LOG` (e.g. "info", "debug"; "warning" is accepted)
//! 3. `info`
//!
//! Events go to stderr. Stdout carries only the scenario trace or the
//! dry-run listing, so it can be diffed between runs.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Install the global subscriber for a `vreactor` run.
///
/// Called once from `main` before the scenario is loaded. A second call
/// fails because a global subscriber is already set.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("VREACTOR_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::INFO),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

/// Lenient parse of `VREACTOR_LOG`; unknown values fall back to `info`.
fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
