// src/scenario/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level scenario file as read from TOML.
///
/// ```toml
/// [scenario]
/// name = "tie-break"
/// poll_interval = 0.5
///
/// [[step]]
/// action = "schedule"
/// label = "A"
/// delay = 5.0
///
/// [[step]]
/// action = "spawn"
/// name = "greeter"
/// executable = "echo"
/// args = ["hi"]
///
/// [[step]]
/// action = "advance"
/// by = 5.0
/// ```
///
/// Steps run in file order.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScenario {
    #[serde(default)]
    pub scenario: ScenarioSection,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// A scenario that passed validation. Build it with `Scenario::try_from`.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub scenario: ScenarioSection,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub(crate) fn new_unchecked(scenario: ScenarioSection, steps: Vec<Step>) -> Self {
        Self { scenario, steps }
    }
}

/// `[scenario]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSection {
    #[serde(default = "default_name")]
    pub name: String,

    /// Interval for `poll` steps that don't set their own.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
}

fn default_name() -> String {
    "scenario".to_string()
}

fn default_poll_interval() -> f64 {
    crate::poll::DEFAULT_POLL_INTERVAL
}

impl Default for ScenarioSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_fd() -> u32 {
    crate::process::STDOUT_FD
}

/// One `[[step]]` entry, selected by its `action` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Schedule a labelled call `delay` seconds from now.
    Schedule { label: String, delay: f64 },

    /// Cancel an earlier `schedule` step.
    Cancel { label: String },

    /// Advance virtual time.
    Advance { by: f64 },

    /// Spawn a fake process under `name`.
    Spawn {
        name: String,
        executable: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
        #[serde(default)]
        path: Option<PathBuf>,
    },

    /// Send a signal to a spawned process.
    Signal { process: String, signal: String },

    /// Have a spawned process write `data` on `fd` (default stdout).
    Output {
        process: String,
        #[serde(default = "default_fd")]
        fd: u32,
        data: String,
    },

    /// End a spawned process with the given exit code.
    Exit {
        process: String,
        #[serde(default)]
        code: i32,
    },

    /// Start polling a condition that turns true after `ready_after` misses.
    Poll {
        label: String,
        ready_after: u32,
        #[serde(default)]
        interval: Option<f64>,
    },
}
