//! Harness orchestration and reporting.
//!
//! Ties the phases together: collection finds scenarios, each item then
//! walks a small state machine — skip marker, change gate, execution
//! switch, external invocation — and ends in exactly one terminal outcome.
//! No retries: a single external invocation is authoritative.
//!
//! ```text
//! NOT_RUN ──(skip marker / gate skip / execution disabled)──▶ SKIPPED
//! NOT_RUN ──▶ RUNNING ──▶ PASSED | XFAILED | FAILED
//! ```
//!
//! Every failure is scoped to the item that produced it; the run as a
//! whole always completes and reports a summary.

use std::path::PathBuf;

use crate::discovery::{collect_scenarios, Collected, ScenarioItem};
use crate::errors::HarnessError;
use crate::gate::{ChangeGate, GateDecision};
use crate::markers::{DriverRegistry, EXPECTED_FAILURE_TAG, SKIP_TAG};
use crate::runner::{build_invocation, execute, DEFAULT_COMMAND};

/// Reason reported when a scenario carries the skip marker.
pub const SKIP_CONFIG_REASON: &str = "Disabled by scenario configuration.";
/// Reason reported when the change gate finds no relevant changes.
pub const SKIP_NO_CHANGE_REASON: &str = "No change in role";
/// Reason reported when the execution switch is off.
pub const SKIP_DISABLED_REASON: &str = "Molecule execution is disabled";

/// Terminal outcome of one test item.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The external tool exited zero.
    Pass { id: String },
    /// The item was tagged expected-failure and the tool did fail.
    XFail { id: String, reason: String },
    /// The tool failed, could not be spawned, the gate tooling broke, or
    /// the scenario configuration did not parse.
    Fail { id: String, reason: String },
    /// Deliberate non-execution, with a human-readable reason.
    Skipped { id: String, reason: String },
}

impl Outcome {
    pub fn id(&self) -> &str {
        match self {
            Outcome::Pass { id }
            | Outcome::XFail { id, .. }
            | Outcome::Fail { id, .. }
            | Outcome::Skipped { id, .. } => id,
        }
    }
}

/// Configuration for one harness run, established once at startup and
/// passed read-only to every phase.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory tree to collect scenarios from.
    pub root: PathBuf,
    /// When false, every collected item is skipped instead of executed.
    pub execution_enabled: bool,
    /// External tool invocation prefix, normally just `molecule`.
    pub command: Vec<String>,
    /// Optional path forwarded as `--base-config`.
    pub base_config: Option<PathBuf>,
    /// Optional git reference enabling the change gate.
    pub git_reference: Option<String>,
    /// Drivers to mark unavailable in the registry.
    pub unavailable_drivers: Vec<String>,
    /// Tag attached to items whose driver is unavailable.
    pub unavailable_marker: Option<String>,
    /// Only run items carrying this tag; others are skipped.
    pub marker_filter: Option<String>,
    /// Extra tool arguments, already shell-tokenized (from MOLECULE_OPTS).
    pub extra_args: Vec<String>,
    pub use_colors: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            execution_enabled: true,
            command: vec![DEFAULT_COMMAND.to_string()],
            base_config: None,
            git_reference: None,
            unavailable_drivers: Vec::new(),
            unavailable_marker: None,
            marker_filter: None,
            extra_args: Vec::new(),
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

// Color constants for terminal output
const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";

impl HarnessConfig {
    /// Apply color formatting to text if colors are enabled.
    pub fn colorize(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }

    /// Builds the driver availability table for this run.
    pub fn build_registry(&self) -> DriverRegistry {
        let mut registry = DriverRegistry::with_known_drivers();
        for driver in &self.unavailable_drivers {
            registry.mark_unavailable(driver);
        }
        registry
    }
}

/// Runs a single collected item through the state machine.
pub fn run_item(item: &ScenarioItem, config: &HarnessConfig, gate: &ChangeGate) -> Outcome {
    let skipped = |reason: String| Outcome::Skipped {
        id: item.id.clone(),
        reason,
    };

    if let Some(filter) = config.marker_filter.as_deref() {
        if !item.has_tag(filter) {
            return skipped(format!("Not tagged '{filter}'"));
        }
    }

    // Skip wins over everything else, including an xfail marker on the
    // same scenario.
    if item.has_tag(SKIP_TAG) {
        return skipped(SKIP_CONFIG_REASON.to_string());
    }

    match gate.check(&item.working_directory) {
        Ok(GateDecision::SkipUnchanged) => {
            return skipped(SKIP_NO_CHANGE_REASON.to_string());
        }
        Ok(GateDecision::Run) => {}
        Err(error) => {
            return Outcome::Fail {
                id: item.id.clone(),
                reason: error.to_string(),
            };
        }
    }

    let spec = build_invocation(
        item,
        &config.command,
        config.base_config.as_deref(),
        &config.extra_args,
    );
    println!(
        "running: {} (from {})",
        spec.command_line(),
        spec.working_directory.display()
    );

    if !config.execution_enabled {
        return skipped(SKIP_DISABLED_REASON.to_string());
    }

    let expected_failure = item.has_tag(EXPECTED_FAILURE_TAG);
    match execute(&spec, &mut |line| println!("{line}")) {
        Ok(result) if result.success() => {
            if expected_failure {
                Outcome::Fail {
                    id: item.id.clone(),
                    reason: format!("unexpectedly passed: {}", spec.command_line()),
                }
            } else {
                Outcome::Pass {
                    id: item.id.clone(),
                }
            }
        }
        Ok(result) => {
            let reason = HarnessError::ExecutionFailure {
                code: result.exit_code(),
                command: spec.command_line(),
            }
            .to_string();
            if expected_failure {
                Outcome::XFail {
                    id: item.id.clone(),
                    reason,
                }
            } else {
                Outcome::Fail {
                    id: item.id.clone(),
                    reason,
                }
            }
        }
        Err(error) => Outcome::Fail {
            id: item.id.clone(),
            reason: error.to_string(),
        },
    }
}

/// Summary counts for one harness run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub passed: usize,
    pub xfailed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Totals {
    pub fn total(&self) -> usize {
        self.passed + self.xfailed + self.failed + self.skipped
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Partition outcomes by kind.
pub fn partition_results(results: &[Outcome]) -> Totals {
    let mut totals = Totals::default();
    for outcome in results {
        match outcome {
            Outcome::Pass { .. } => totals.passed += 1,
            Outcome::XFail { .. } => totals.xfailed += 1,
            Outcome::Fail { .. } => totals.failed += 1,
            Outcome::Skipped { .. } => totals.skipped += 1,
        }
    }
    totals
}

/// Print per-item outcome lines and a summary.
pub fn report_results(results: &[Outcome], config: &HarnessConfig) {
    for outcome in results {
        match outcome {
            Outcome::Pass { id } => {
                println!("{}: {}", config.colorize("PASS", GREEN), id);
            }
            Outcome::XFail { id, reason } => {
                println!("{}: {} ({})", config.colorize("XFAIL", YELLOW), id, reason);
            }
            Outcome::Fail { id, reason } => {
                eprintln!("{}: {}", config.colorize("FAIL", RED), id);
                eprintln!("  {}", reason);
            }
            Outcome::Skipped { id, reason } => {
                println!("{}: {} ({})", config.colorize("SKIP", YELLOW), id, reason);
            }
        }
    }

    let totals = partition_results(results);
    println!(
        "\nScenario summary: total {}, {} {}, {} {}, {} {}, {} {}",
        totals.total(),
        config.colorize("passed", GREEN),
        totals.passed,
        config.colorize("xfailed", YELLOW),
        totals.xfailed,
        config.colorize("failed", RED),
        totals.failed,
        config.colorize("skipped", YELLOW),
        totals.skipped,
    );

    if totals.failed > 0 {
        eprintln!("\nFailed scenarios:");
        for outcome in results {
            if let Outcome::Fail { id, .. } = outcome {
                eprintln!("  - {}", id);
            }
        }
    }
}

/// Collects every scenario under the configured root and runs each one.
///
/// Broken scenario configurations become failures of their own item and do
/// not stop the rest of the run.
pub fn run_all(config: &HarnessConfig) -> Totals {
    let registry = config.build_registry();
    let gate = ChangeGate::new(config.git_reference.clone());
    let collected = collect_scenarios(
        &config.root,
        &registry,
        config.unavailable_marker.as_deref(),
    );

    let results: Vec<Outcome> = collected
        .into_iter()
        .map(|entry| match entry {
            Collected::Scenario(item) => run_item(&item, config, &gate),
            Collected::Broken { path, error } => Outcome::Fail {
                id: path.display().to_string(),
                reason: error.to_string(),
            },
        })
        .collect();

    report_results(&results, config);
    partition_results(&results)
}
