// src/scenario/validate.rs

use std::collections::HashSet;

use crate::errors::{ReactorError, Result};
use crate::scenario::model::{RawScenario, Scenario, Step};

impl TryFrom<RawScenario> for Scenario {
    type Error = ReactorError;

    fn try_from(raw: RawScenario) -> std::result::Result<Self, Self::Error> {
        validate_raw_scenario(&raw)?;
        Ok(Scenario::new_unchecked(raw.scenario, raw.steps))
    }
}

fn validate_raw_scenario(raw: &RawScenario) -> Result<()> {
    ensure_has_steps(raw)?;
    validate_section(raw)?;
    validate_steps(raw)?;
    Ok(())
}

fn ensure_has_steps(raw: &RawScenario) -> Result<()> {
    if raw.steps.is_empty() {
        return Err(ReactorError::ScenarioError(
            "scenario must contain at least one [[step]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_section(raw: &RawScenario) -> Result<()> {
    check_interval("[scenario].poll_interval", raw.scenario.poll_interval)
}

/// Poll intervals must be strictly positive: a zero interval with a
/// condition that never holds would keep `advance` draining forever.
fn check_interval(what: &str, interval: f64) -> Result<()> {
    if interval.is_finite() && interval > 0.0 {
        Ok(())
    } else {
        Err(ReactorError::ScenarioError(format!(
            "{what} must be > 0 (got {interval})"
        )))
    }
}

fn check_span(index: usize, what: &str, seconds: f64) -> Result<()> {
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(())
    } else {
        Err(ReactorError::ScenarioError(format!(
            "step {index}: {what} must be a non-negative number of seconds (got {seconds})"
        )))
    }
}

fn validate_steps(raw: &RawScenario) -> Result<()> {
    let mut labels: HashSet<&str> = HashSet::new();
    let mut scheduled: HashSet<&str> = HashSet::new();
    let mut processes: HashSet<&str> = HashSet::new();

    let duplicate = |index: usize, kind: &str, name: &str| {
        ReactorError::ScenarioError(format!("step {index}: duplicate {kind} '{name}'"))
    };
    let unknown = |index: usize, kind: &str, name: &str| {
        ReactorError::ScenarioError(format!(
            "step {index}: unknown {kind} '{name}' (must be defined by an earlier step)"
        ))
    };

    for (index, step) in raw.steps.iter().enumerate() {
        match step {
            Step::Schedule { label, delay } => {
                check_span(index, "delay", *delay)?;
                if !labels.insert(label) {
                    return Err(duplicate(index, "label", label.as_str()));
                }
                scheduled.insert(label);
            }
            Step::Cancel { label } => {
                if !scheduled.contains(label.as_str()) {
                    return Err(unknown(index, "scheduled label", label.as_str()));
                }
            }
            Step::Advance { by } => check_span(index, "advance", *by)?,
            Step::Spawn { name, executable, .. } => {
                if executable.trim().is_empty() {
                    return Err(ReactorError::ScenarioError(format!(
                        "step {index}: process '{name}' has an empty executable"
                    )));
                }
                if !processes.insert(name) {
                    return Err(duplicate(index, "process", name.as_str()));
                }
            }
            Step::Signal { process, .. }
            | Step::Output { process, .. }
            | Step::Exit { process, .. } => {
                if !processes.contains(process.as_str()) {
                    return Err(unknown(index, "process", process.as_str()));
                }
            }
            Step::Poll {
                label, interval, ..
            } => {
                if let Some(interval) = interval {
                    check_interval(&format!("step {index}: interval"), *interval)?;
                }
                if !labels.insert(label) {
                    return Err(duplicate(index, "label", label.as_str()));
                }
            }
        }
    }

    Ok(())
}
