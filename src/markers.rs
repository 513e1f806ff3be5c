//! Tag derivation for collected scenarios.
//!
//! Converts a [`ScenarioConfig`] into the immutable tag set attached to a
//! test item: the driver name, lifecycle tags, one tag per platform, the
//! global `molecule` tag, and optionally a configured tag for scenarios
//! whose driver is unavailable in this environment.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ScenarioConfig, DEFAULT_DRIVER};

/// Tag attached to every collected scenario.
pub const MOLECULE_TAG: &str = "molecule";
/// Lifecycle tag: the scenario is disabled by its own configuration.
pub const SKIP_TAG: &str = "skip";
/// Lifecycle tag: the scenario is expected to fail.
pub const EXPECTED_FAILURE_TAG: &str = "expected-failure";

/// Marker spelling in `molecule.yml` that maps to [`EXPECTED_FAILURE_TAG`].
const XFAIL_MARKER: &str = "xfail";
/// Marker spelling in `molecule.yml` that maps to [`SKIP_TAG`].
const SKIP_MARKER: &str = "skip";

/// Driver names registered by default, all presumed available.
const KNOWN_DRIVERS: &[&str] = &[
    "azure",
    "containers",
    "delegated",
    "docker",
    "ec2",
    "gce",
    "lxd",
    "openstack",
    "podman",
    "vagrant",
];

/// Availability table for Molecule drivers.
///
/// Built once at startup and passed by reference to every derivation call;
/// read-only afterwards. Drivers the table has never heard of are presumed
/// available, matching the permissive default of the registry this replaces.
#[derive(Debug, Clone)]
pub struct DriverRegistry {
    availability: BTreeMap<String, bool>,
}

impl DriverRegistry {
    /// Builds the registry with every known driver marked available.
    pub fn with_known_drivers() -> Self {
        let mut availability = BTreeMap::new();
        for driver in KNOWN_DRIVERS {
            availability.insert((*driver).to_string(), true);
        }
        availability.insert(DEFAULT_DRIVER.to_string(), true);
        Self { availability }
    }

    /// Marks a driver as unavailable in this environment.
    pub fn mark_unavailable(&mut self, name: &str) {
        self.availability.insert(name.to_string(), false);
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.availability.get(name).copied().unwrap_or(true)
    }

    /// Registered driver names, in sorted order.
    pub fn driver_names(&self) -> impl Iterator<Item = &str> {
        self.availability.keys().map(String::as_str)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_known_drivers()
    }
}

/// Derives the full tag set for one scenario configuration.
///
/// Deterministic and pure. Both `xfail` and `skip` markers may be present
/// simultaneously; both tags are attached without precedence resolution
/// (scenario authoring intent is passed through, resolution happens at run
/// time where the skip check is evaluated first).
pub fn derive_tags(
    config: &ScenarioConfig,
    registry: &DriverRegistry,
    unavailable_marker: Option<&str>,
) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(config.driver.name.clone());
    if config.markers.iter().any(|m| m == XFAIL_MARKER) {
        tags.insert(EXPECTED_FAILURE_TAG.to_string());
    }
    if config.markers.iter().any(|m| m == SKIP_MARKER) {
        tags.insert(SKIP_TAG.to_string());
    }
    for platform in &config.platforms {
        tags.insert(platform.name.clone());
    }
    tags.insert(MOLECULE_TAG.to_string());
    if let Some(marker) = unavailable_marker {
        if !registry.is_available(&config.driver.name) {
            tags.insert(marker.to_string());
        }
    }
    tags
}
