//! External tool invocation.
//!
//! Builds the `molecule` command line for one scenario, spawns it with the
//! scenario's role root as working directory, and relays its output line by
//! line as it arrives. Standard error is merged into standard output so the
//! relayed transcript keeps the interleaving a terminal would have shown.

use std::borrow::Cow;
use std::env;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;

use tracing::debug;

use crate::discovery::ScenarioItem;
use crate::errors::{HarnessError, Result};

/// Environment variable carrying extra arguments for every invocation,
/// as one shell-quoted string.
pub const MOLECULE_OPTS_VAR: &str = "MOLECULE_OPTS";

/// Default external tool command.
pub const DEFAULT_COMMAND: &str = "molecule";

/// Subcommand driven for every scenario.
const TEST_SUBCOMMAND: &str = "test";

/// A fully built invocation of the external tool. Built fresh per run and
/// never persisted.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: PathBuf,
}

impl InvocationSpec {
    /// The invocation as a single shell-quoted string, suitable for
    /// reproducing the run manually.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|arg| quote(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(arg: &str) -> String {
    match shlex::try_quote(arg) {
        Ok(quoted) => Cow::into_owned(quoted),
        // try_quote only fails on interior NUL; pass the raw text through.
        Err(_) => arg.to_string(),
    }
}

/// Outcome of one finished invocation. Terminal: mapped immediately to a
/// pass/fail outcome and discarded.
#[derive(Debug)]
pub struct ExecutionResult {
    pub status: ExitStatus,
    /// The combined stdout/stderr transcript, in arrival order.
    pub lines: Vec<String>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code of the invocation. Signal termination is folded to the
    /// negated signal number, the way POSIX shells report it.
    pub fn exit_code(&self) -> i32 {
        if let Some(code) = self.status.code() {
            return code;
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = self.status.signal() {
                return -signal;
            }
        }
        -1
    }
}

/// Shell-tokenizes an option string in the manner of `MOLECULE_OPTS`.
pub fn parse_extra_opts(raw: &str) -> Result<Vec<String>> {
    shlex::split(raw).ok_or_else(|| HarnessError::OptsParse {
        value: raw.to_string(),
    })
}

/// Reads and tokenizes `MOLECULE_OPTS` from the environment. Absent or
/// empty means no extra arguments.
pub fn extra_opts_from_env() -> Result<Vec<String>> {
    match env::var(MOLECULE_OPTS_VAR) {
        Ok(raw) if !raw.is_empty() => parse_extra_opts(&raw),
        _ => Ok(Vec::new()),
    }
}

/// Builds the invocation for one scenario:
/// `<command> [--base-config <path>] test -s <scenario> [<extra>...]`.
pub fn build_invocation(
    item: &ScenarioItem,
    command: &[String],
    base_config: Option<&Path>,
    extra: &[String],
) -> InvocationSpec {
    let (program, leading) = match command.split_first() {
        Some((program, rest)) => (program.clone(), rest.to_vec()),
        None => (DEFAULT_COMMAND.to_string(), Vec::new()),
    };
    let mut args = leading;
    if let Some(base) = base_config {
        args.push("--base-config".to_string());
        args.push(base.display().to_string());
    }
    args.push(TEST_SUBCOMMAND.to_string());
    args.push("-s".to_string());
    args.push(item.scenario_name.clone());
    args.extend(extra.iter().cloned());

    InvocationSpec {
        program,
        args,
        working_directory: item.working_directory.clone(),
    }
}

/// Spawns the invocation and relays its merged output.
///
/// `on_line` is called for every line as it arrives; the full transcript is
/// also retained in the result. The call blocks until the child exits.
pub fn execute(spec: &InvocationSpec, on_line: &mut dyn FnMut(&str)) -> Result<ExecutionResult> {
    debug!(command = %spec.command_line(), cwd = %spec.working_directory.display(), "spawning");
    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .current_dir(&spec.working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| HarnessError::Spawn {
            command: spec.command_line(),
            source,
        })?;

    let lines = drain_merged_output(&mut child, on_line);
    let status = child.wait().map_err(|source| HarnessError::Spawn {
        command: spec.command_line(),
        source,
    })?;

    Ok(ExecutionResult { status, lines })
}

/// Drains a child's stdout and stderr as one merged, line-buffered stream.
///
/// One reader thread per pipe feeds a single channel; the calling thread
/// blocks on the channel and forwards each line the moment it arrives, so
/// relay order matches arrival order. Returns once both pipes close.
pub(crate) fn drain_merged_output(
    child: &mut Child,
    on_line: &mut dyn FnMut(&str),
) -> Vec<String> {
    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_line_reader(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_line_reader(stderr, tx.clone()));
    }
    drop(tx);

    let mut lines = Vec::new();
    for line in rx {
        on_line(&line);
        lines.push(line);
    }
    for reader in readers {
        let _ = reader.join();
    }
    lines
}

fn spawn_line_reader<R: Read + Send + 'static>(
    pipe: R,
    tx: mpsc::Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}
