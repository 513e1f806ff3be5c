//! Scenario discovery.
//!
//! Walks a directory tree for `molecule.yml` files and produces exactly one
//! test item per scenario. Discovery runs once per invocation; the returned
//! items are immutable and consumed read-only by the execution phase.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::load_scenario_config;
use crate::errors::HarnessError;
use crate::markers::{derive_tags, DriverRegistry};

/// File name that marks a directory as a Molecule scenario.
pub const SCENARIO_FILE: &str = "molecule.yml";

/// One runnable test item, produced by collection.
///
/// Tags are derived exactly once here and never mutated afterwards: every
/// item carries exactly one driver tag and at most the two lifecycle tags.
#[derive(Debug, Clone)]
pub struct ScenarioItem {
    /// Display identifier, `<scenario>[<driver>]`.
    pub id: String,
    /// Name of the scenario, taken from its directory name.
    pub scenario_name: String,
    pub driver_name: String,
    pub tags: BTreeSet<String>,
    /// Directory the external tool runs from: two levels above the
    /// scenario directory, i.e. the root of the role under test.
    pub working_directory: PathBuf,
    pub config_path: PathBuf,
}

impl ScenarioItem {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// A collection result: either a runnable item or a scenario whose
/// configuration could not be parsed.
///
/// Broken scenarios are reported as failures for that one scenario and
/// never abort collection of the rest.
#[derive(Debug)]
pub enum Collected {
    Scenario(ScenarioItem),
    Broken { path: PathBuf, error: HarnessError },
}

/// Walks `root` and collects every scenario configuration found.
///
/// Discovered paths are sorted so collection order is deterministic across
/// platforms.
pub fn collect_scenarios(
    root: &Path,
    registry: &DriverRegistry,
    unavailable_marker: Option<&str>,
) -> Vec<Collected> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name().to_str() == Some(SCENARIO_FILE))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| collect_one(&path, registry, unavailable_marker))
        .collect()
}

fn collect_one(
    config_path: &Path,
    registry: &DriverRegistry,
    unavailable_marker: Option<&str>,
) -> Collected {
    let config = match load_scenario_config(config_path) {
        Ok(config) => config,
        Err(error) => {
            return Collected::Broken {
                path: config_path.to_path_buf(),
                error,
            };
        }
    };

    let scenario_dir = match config_path.parent() {
        Some(dir) => dir,
        None => Path::new("."),
    };
    let scenario_name = scenario_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string());

    let joined = scenario_dir.join("..").join("..");
    let working_directory = joined.canonicalize().unwrap_or(joined);

    let tags = derive_tags(&config, registry, unavailable_marker);
    debug!(
        scenario = %scenario_name,
        driver = %config.driver.name,
        path = %config_path.display(),
        "collected scenario"
    );

    Collected::Scenario(ScenarioItem {
        id: format!("{}[{}]", scenario_name, config.driver.name),
        scenario_name,
        driver_name: config.driver.name,
        tags,
        working_directory,
        config_path: config_path.to_path_buf(),
    })
}
