//! Scenario configuration loading.
//!
//! A scenario is described by its `molecule.yml`. Only the fields the
//! harness cares about are modeled; everything else in the document is
//! ignored. An empty file is a valid all-default configuration.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{HarnessError, Result};

/// Driver name assigned to scenarios whose configuration names none.
pub const DEFAULT_DRIVER: &str = "no_driver";

/// The parsed subset of a scenario's `molecule.yml`.
///
/// Immutable after load; tags are derived from it exactly once at
/// collection time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub driver: DriverSpec,
    pub markers: Vec<String>,
    pub platforms: Vec<Platform>,
}

/// The `driver:` block of a scenario configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverSpec {
    pub name: String,
}

impl Default for DriverSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_DRIVER.to_string(),
        }
    }
}

/// One `platforms:` entry. Platforms carry many more fields in practice;
/// only the name matters for tagging.
#[derive(Debug, Clone, Deserialize)]
pub struct Platform {
    pub name: String,
}

/// Reads and parses a scenario configuration file.
///
/// An empty document yields [`ScenarioConfig::default`]. A document whose
/// root is not a mapping is rejected with
/// [`HarnessError::ConfigParse`].
pub fn load_scenario_config(path: &Path) -> Result<ScenarioConfig> {
    let content = fs::read_to_string(path).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scenario_config(&content).map_err(|message| HarnessError::ConfigParse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parses a scenario configuration document from a string.
pub fn parse_scenario_config(content: &str) -> std::result::Result<ScenarioConfig, String> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    match document {
        // An empty molecule.yml parses as null; treat it as all-default.
        serde_yaml::Value::Null => Ok(ScenarioConfig::default()),
        serde_yaml::Value::Mapping(_) => {
            serde_yaml::from_value(document).map_err(|e| e.to_string())
        }
        other => Err(format!(
            "expected a mapping at the document root, found {}",
            yaml_kind(&other)
        )),
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
