//! Skip-if-unchanged pre-check.
//!
//! When a git reference is configured, each scenario's role directory is
//! diffed against it before execution. An empty diff means the scenario can
//! be skipped; a failing diff command is a hard failure, never a skip.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::errors::{HarnessError, Result};
use crate::runner::drain_merged_output;

/// What the gate decided for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Changes were found (or the gate is disabled); run the scenario.
    Run,
    /// The diff produced no output; the scenario can be skipped.
    SkipUnchanged,
}

/// Optional change gate around scenario execution.
#[derive(Debug, Clone)]
pub struct ChangeGate {
    reference: Option<String>,
    program: String,
}

impl ChangeGate {
    /// A gate diffing against `reference`; `None` disables the gate.
    pub fn new(reference: Option<String>) -> Self {
        Self {
            reference,
            program: "git".to_string(),
        }
    }

    /// Replaces the version-control executable. Used by tests to stand in
    /// a stub for git.
    pub fn with_program(reference: Option<String>, program: impl Into<String>) -> Self {
        Self {
            reference,
            program: program.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.reference.is_some()
    }

    /// Diffs `workdir` against the configured reference.
    ///
    /// Returns [`GateDecision::Run`] when the gate is disabled or the diff
    /// shows changes, [`GateDecision::SkipUnchanged`] when it shows none,
    /// and [`HarnessError::ChangeGateTool`] when the diff command itself
    /// fails.
    pub fn check(&self, workdir: &Path) -> Result<GateDecision> {
        let Some(reference) = self.reference.as_deref() else {
            return Ok(GateDecision::Run);
        };

        let gate_error = |detail: String| HarnessError::ChangeGateTool {
            reference: reference.to_string(),
            workdir: workdir.to_path_buf(),
            detail,
        };

        let mut child = Command::new(&self.program)
            .args(["diff", reference, "--", "./"])
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| gate_error(e.to_string()))?;

        let lines = drain_merged_output(&mut child, &mut |_| {});
        let status = child.wait().map_err(|e| gate_error(e.to_string()))?;

        if !status.success() {
            return Err(gate_error(format!(
                "{} (output: {})",
                status,
                lines.join("\n")
            )));
        }

        debug!(reference, lines = lines.len(), "change gate diff finished");
        if lines.is_empty() {
            Ok(GateDecision::SkipUnchanged)
        } else {
            Ok(GateDecision::Run)
        }
    }
}
