//!
//! This module is the main entry point for the CLI and wires the
//! command-line surface onto the harness library.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use crate::{
    discovery::{collect_scenarios, Collected},
    harness::{run_all, HarnessConfig},
    runner::{extra_opts_from_env, DEFAULT_COMMAND},
};

// ============================================================================
// CLI ARGUMENTS - Command-line argument definitions
// ============================================================================

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "molecule-harness",
    version,
    about = "Discover Molecule scenarios and run each one as a single test case."
)]
pub struct HarnessArgs {
    #[command(subcommand)]
    pub command: ArgsCommand,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum ArgsCommand {
    /// Collect scenarios and print them with their tags, without running.
    List {
        /// Directory tree to search for molecule.yml files.
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Mark a driver as unavailable (repeatable).
        #[arg(long = "unavailable-driver", value_name = "DRIVER")]
        unavailable_drivers: Vec<String>,
        /// Tag to attach to scenarios whose driver is unavailable.
        #[arg(long = "unavailable-driver-marker", value_name = "TAG")]
        unavailable_marker: Option<String>,
    },
    /// Collect scenarios and run each one with the external tool.
    Run {
        /// Directory tree to search for molecule.yml files.
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Collect, gate and report as usual, but skip every execution.
        #[arg(long)]
        no_execute: bool,
        /// Forwarded to the tool as --base-config.
        #[arg(long, value_name = "PATH")]
        base_config: Option<PathBuf>,
        /// Skip scenarios whose role shows no git diff against this
        /// reference.
        #[arg(long = "skip-no-git-change", value_name = "REF")]
        git_reference: Option<String>,
        /// Only run scenarios carrying this tag.
        #[arg(long, value_name = "TAG")]
        marker: Option<String>,
        /// Mark a driver as unavailable (repeatable).
        #[arg(long = "unavailable-driver", value_name = "DRIVER")]
        unavailable_drivers: Vec<String>,
        /// Tag to attach to scenarios whose driver is unavailable.
        #[arg(long = "unavailable-driver-marker", value_name = "TAG")]
        unavailable_marker: Option<String>,
        /// Override the external tool command (shell-tokenized).
        #[arg(long, value_name = "CMD", default_value = DEFAULT_COMMAND)]
        tool: String,
    },
}

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

/// The main entry point for the CLI.
pub fn run() {
    let args = HarnessArgs::parse();

    match args.command {
        ArgsCommand::List {
            root,
            unavailable_drivers,
            unavailable_marker,
        } => {
            list_scenarios(&root, &unavailable_drivers, unavailable_marker.as_deref());
        }

        ArgsCommand::Run {
            root,
            no_execute,
            base_config,
            git_reference,
            marker,
            unavailable_drivers,
            unavailable_marker,
            tool,
        } => {
            // A tool string that defies tokenizing is taken as one program
            // name; spawning will then fail with a message naming it.
            let command = shlex::split(&tool).unwrap_or_else(|| vec![tool.clone()]);
            let extra_args = extra_opts_from_env().unwrap_or_else(|e| report_and_exit(e));
            let config = HarnessConfig {
                root,
                execution_enabled: !no_execute,
                command,
                base_config,
                git_reference,
                unavailable_drivers,
                unavailable_marker,
                marker_filter: marker,
                extra_args,
                ..HarnessConfig::default()
            };

            let totals = run_all(&config);
            if totals.has_failures() {
                process::exit(1);
            }
        }
    }
}

// ============================================================================
// SUBCOMMAND BODIES
// ============================================================================

fn list_scenarios(root: &PathBuf, unavailable_drivers: &[String], unavailable_marker: Option<&str>) {
    let config = HarnessConfig {
        unavailable_drivers: unavailable_drivers.to_vec(),
        ..HarnessConfig::default()
    };
    let registry = config.build_registry();

    let collected = collect_scenarios(root, &registry, unavailable_marker);
    if collected.is_empty() {
        println!("No scenarios found under {}", root.display());
        return;
    }

    let mut broken = 0usize;
    for entry in &collected {
        match entry {
            Collected::Scenario(item) => {
                let tags: Vec<&str> = item.tags.iter().map(String::as_str).collect();
                println!(
                    "{} {} [{}]",
                    item.id,
                    item.config_path.display(),
                    tags.join(", ")
                );
            }
            Collected::Broken { path, .. } => {
                broken += 1;
                eprintln!("BROKEN: {}", path.display());
            }
        }
    }

    for entry in collected {
        if let Collected::Broken { error, .. } = entry {
            let report = miette::Report::new(error);
            eprintln!("{report:?}");
        }
    }

    if broken > 0 {
        process::exit(1);
    }
}

fn report_and_exit(error: crate::HarnessError) -> ! {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
    process::exit(2);
}
