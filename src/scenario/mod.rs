// src/scenario/mod.rs

//! Scenario files for the `vreactor` binary.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a scenario from disk (`loader.rs`).
//! - Validate references, labels and durations (`validate.rs`).
//! - Replay the steps on a fake host and collect a trace (`runner.rs`).

pub mod loader;
pub mod model;
pub mod runner;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{RawScenario, Scenario, ScenarioSection, Step};
pub use runner::{run_scenario, ScenarioRunner, TraceEvent};
