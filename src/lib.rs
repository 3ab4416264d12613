// src/lib.rs

//! Deterministic virtual-time scheduling and process emulation for testing
//! asynchronous orchestration code.
//!
//! - [`clock`]: the [`Scheduler`](clock::Scheduler) trait, the
//!   [`VirtualClock`](clock::VirtualClock) test implementation and the
//!   tokio-backed production one.
//! - [`process`]: the [`ProcessHost`](process::ProcessHost) trait, the
//!   recording [`FakeProcessHost`](process::FakeProcessHost) and the real
//!   `tokio::process` host.
//! - [`future`]: [`FutureValue`](future::FutureValue), a one-shot result
//!   with synchronous continuations.
//! - [`poll`]: retry a condition on any scheduler until it yields a value.
//! - [`scenario`]: TOML scenarios replayed by the `vreactor` binary.

pub mod cli;
pub mod clock;
pub mod errors;
pub mod future;
pub mod logging;
pub mod poll;
pub mod process;
pub mod scenario;
pub mod types;

use anyhow::Result;
use tracing::debug;

use crate::cli::CliArgs;
use crate::scenario::{load_and_validate, run_scenario, Scenario, Step};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the scenario, then either prints it (`--dry-run`) or
/// replays it and prints the trace to stdout.
pub fn run(args: CliArgs) -> Result<()> {
    let scenario = load_and_validate(&args.scenario)?;

    if args.dry_run {
        print_dry_run(&scenario);
        return Ok(());
    }

    for event in run_scenario(&scenario)? {
        println!("{event}");
    }
    Ok(())
}

/// Simple dry-run output: print the scenario settings and each step.
fn print_dry_run(scenario: &Scenario) {
    println!("vreactor dry-run");
    println!("  scenario.name = {}", scenario.scenario.name);
    println!("  scenario.poll_interval = {}", scenario.scenario.poll_interval);
    println!();

    println!("steps ({}):", scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        println!("  {index:>3}: {}", describe_step(step));
    }

    debug!("dry-run complete (nothing executed)");
}

fn describe_step(step: &Step) -> String {
    match step {
        Step::Schedule { label, delay } => format!("schedule {label} after {delay}s"),
        Step::Cancel { label } => format!("cancel {label}"),
        Step::Advance { by } => format!("advance {by}s"),
        Step::Spawn {
            name,
            executable,
            args,
            ..
        } => format!("spawn {name}: {executable} {args:?}"),
        Step::Signal { process, signal } => format!("signal {process} with {signal}"),
        Step::Output { process, fd, data } => format!("{process} writes {data:?} on fd {fd}"),
        Step::Exit { process, code } => format!("{process} exits with {code}"),
        Step::Poll {
            label,
            ready_after,
            interval,
        } => match interval {
            Some(interval) => format!("poll {label} (ready after {ready_after} misses, every {interval}s)"),
            None => format!("poll {label} (ready after {ready_after} misses)"),
        },
    }
}
