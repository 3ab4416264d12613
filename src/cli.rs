// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{CommandFactory, Parser, ValueEnum};

/// Command-line arguments for `vreactor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "vreactor",
    version,
    about = "Replay a scheduling and process scenario on a deterministic virtual clock.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the scenario file (TOML).
    ///
    /// Default: `Scenario.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Scenario.toml")]
    pub scenario: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `VREACTOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate and print the steps, but don't run them.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// Rendered `--help` text.
pub fn help_text() -> String {
    CliArgs::command().render_help().to_string()
}
