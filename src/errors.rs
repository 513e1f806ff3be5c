//! Unified error type for scenario collection and execution.
//!
//! Every failure class the harness can produce is a variant here. Skips are
//! deliberately not errors: they are ordinary outcomes carrying a reason
//! string and live in [`crate::harness::Outcome`].

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors produced while collecting or running Molecule scenarios.
///
/// Each error is scoped to the single scenario that produced it; the harness
/// never aborts a whole run because one item failed.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    /// The scenario configuration file was not a valid YAML mapping.
    #[error("failed to parse scenario configuration {}: {message}", .path.display())]
    #[diagnostic(
        code(molecule_harness::config_parse),
        help("molecule.yml must be a YAML mapping; an empty file is also accepted")
    )]
    ConfigParse { path: PathBuf, message: String },

    /// The version-control diff backing the change gate could not be run or
    /// exited non-zero. Never silently treated as "no changes".
    #[error("git diff against {reference} failed in {}: {detail}", .workdir.display())]
    #[diagnostic(code(molecule_harness::change_gate))]
    ChangeGateTool {
        reference: String,
        workdir: PathBuf,
        detail: String,
    },

    /// The external tool ran to completion and reported failure.
    #[error("Error code {code} returned by: {command}")]
    #[diagnostic(
        code(molecule_harness::execution),
        help("the printed command line can be re-run manually to reproduce")
    )]
    ExecutionFailure { code: i32, command: String },

    /// The external tool could not be spawned at all.
    #[error("failed to run {command}: {source}")]
    #[diagnostic(code(molecule_harness::spawn))]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The MOLECULE_OPTS environment variable could not be shell-tokenized.
    #[error("could not tokenize MOLECULE_OPTS: {value}")]
    #[diagnostic(
        code(molecule_harness::opts),
        help("check for unbalanced quotes in the option string")
    )]
    OptsParse { value: String },

    /// Filesystem access failed during collection.
    #[error("failed to read {}: {source}", .path.display())]
    #[diagnostic(code(molecule_harness::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, HarnessError>;
