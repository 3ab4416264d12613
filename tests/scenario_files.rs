// tests/scenario_files.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use vreactor::errors::ReactorError;
use vreactor::process::ProcessEnded;
use vreactor::scenario::{load_and_validate, run_scenario, Step, TraceEvent};
use vreactor_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn write_scenario(dir: &TempDir, contents: &str) -> std::io::Result<PathBuf> {
    let path = dir.path().join("Scenario.toml");
    fs::write(&path, contents)?;
    Ok(path)
}

fn scenario_error(contents: &str) -> String {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(&dir, contents).unwrap();
    match load_and_validate(&path) {
        Err(ReactorError::ScenarioError(message)) => message,
        other => panic!("expected a scenario error, got {other:?}"),
    }
}

const PROCESS_SCENARIO: &str = r#"
[scenario]
name = "greeter"
poll_interval = 1.0

[[step]]
action = "spawn"
name = "greeter"
executable = "echo"
args = ["hi"]
path = "/tmp"

[[step]]
action = "poll"
label = "ready"
ready_after = 2

[[step]]
action = "schedule"
label = "kill-timer"
delay = 10.0

[[step]]
action = "output"
process = "greeter"
data = "hi\n"

[[step]]
action = "advance"
by = 1.0

[[step]]
action = "advance"
by = 1.0

[[step]]
action = "signal"
process = "greeter"
signal = "TERM"

[[step]]
action = "exit"
process = "greeter"
code = 143

[[step]]
action = "cancel"
label = "kill-timer"

[[step]]
action = "advance"
by = 20.0
"#;

#[test]
fn process_scenario_replays_to_a_deterministic_trace() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let path = write_scenario(&dir, PROCESS_SCENARIO)?;

    let scenario = load_and_validate(&path)?;
    assert_eq!(scenario.scenario.name, "greeter");
    assert_eq!(scenario.steps.len(), 10);
    assert!(matches!(
        &scenario.steps[0],
        Step::Spawn { args, path: Some(_), .. } if args == &["hi"]
    ));

    let trace = run_scenario(&scenario)?;
    assert_eq!(
        trace,
        vec![
            TraceEvent::Spawned {
                process: "greeter".into(),
                pid: Some(10_000)
            },
            TraceEvent::Output {
                process: "greeter".into(),
                fd: 1,
                data: "hi\n".into()
            },
            TraceEvent::Advanced { to: 1.0 },
            TraceEvent::PollResolved {
                label: "ready".into(),
                attempts: 3,
                at: 2.0
            },
            TraceEvent::Advanced { to: 2.0 },
            TraceEvent::Signalled {
                process: "greeter".into(),
                signal: "TERM".into()
            },
            TraceEvent::Exited {
                process: "greeter".into(),
                reason: ProcessEnded::from_exit_code(143)
            },
            TraceEvent::Cancelled {
                label: "kill-timer".into()
            },
            TraceEvent::Advanced { to: 22.0 },
        ]
    );

    // Same file, same trace.
    assert_eq!(run_scenario(&load_and_validate(&path)?)?, trace);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let result = load_and_validate(dir.path().join("nope.toml"));
    assert!(matches!(result, Err(ReactorError::IoError(_))));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let dir = TempDir::new().unwrap();
    let path = write_scenario(&dir, "[[step]]\naction = \"teleport\"\n").unwrap();
    assert!(matches!(load_and_validate(&path), Err(ReactorError::TomlError(_))));
}

#[test]
fn scenario_without_steps_is_rejected() {
    let message = scenario_error("[scenario]\nname = \"empty\"\n");
    assert!(message.contains("at least one"), "{message}");
}

#[test]
fn cancelling_an_unknown_label_is_rejected() {
    let message = scenario_error("[[step]]\naction = \"cancel\"\nlabel = \"A\"\n");
    assert!(message.contains("unknown scheduled label 'A'"), "{message}");
}

#[test]
fn negative_advance_is_rejected() {
    let message = scenario_error("[[step]]\naction = \"advance\"\nby = -1.0\n");
    assert!(message.contains("non-negative"), "{message}");
}

#[test]
fn signalling_an_unknown_process_is_rejected() {
    let message = scenario_error(
        "[[step]]\naction = \"signal\"\nprocess = \"ghost\"\nsignal = \"KILL\"\n",
    );
    assert!(message.contains("unknown process 'ghost'"), "{message}");
}

#[test]
fn zero_poll_interval_is_rejected() {
    let message = scenario_error(
        "[scenario]\npoll_interval = 0.0\n\n[[step]]\naction = \"advance\"\nby = 1.0\n",
    );
    assert!(message.contains("poll_interval must be > 0"), "{message}");
}

fn fired(trace: &[TraceEvent]) -> Vec<&str> {
    trace
        .iter()
        .filter_map(|e| match e {
            TraceEvent::Fired { label, .. } => Some(label.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn demo_tie_break_scenario_fires_c_a_b() -> TestResult {
    init_tracing();
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let scenario = load_and_validate(manifest.join("demos/tie-break.toml"))?;

    let trace = run_scenario(&scenario)?;
    assert_eq!(fired(&trace), vec!["C", "A", "B"]);
    assert_eq!(trace.last(), Some(&TraceEvent::Advanced { to: 5.0 }));
    Ok(())
}

#[test]
fn demo_graceful_shutdown_never_fires_the_kill_timer() -> TestResult {
    init_tracing();
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let scenario = load_and_validate(manifest.join("demos/graceful-shutdown.toml"))?;

    let trace = run_scenario(&scenario)?;
    assert!(fired(&trace).is_empty());
    assert!(trace.contains(&TraceEvent::PollResolved {
        label: "healthy".into(),
        attempts: 4,
        at: 1.5
    }));
    assert!(trace.contains(&TraceEvent::Output {
        process: "server".into(),
        fd: 2,
        data: "shutting down\n".into()
    }));
    assert!(trace.contains(&TraceEvent::Exited {
        process: "server".into(),
        reason: ProcessEnded::Done
    }));
    assert_eq!(trace.last(), Some(&TraceEvent::Advanced { to: 16.5 }));
    Ok(())
}
