//! Machine catalog types and selection heuristics.
//!
//! Pure functions only: no I/O, no async.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

/// A machine type the repository can be created on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Machine {
    pub name: String,
    pub display_name: String,
    /// `pool`, `blob`, `none`, or empty.
    #[serde(default)]
    pub prebuild_availability: String,
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub memory_in_bytes: u64,
    #[serde(default)]
    pub storage_in_bytes: u64,
}

impl Machine {
    /// Label shown when offering this machine to the user.
    #[must_use]
    pub fn label(&self) -> String {
        build_display_name(&self.display_name, &self.prebuild_availability)
    }
}

/// Appends the prebuild marker for `pool` and `blob` availability.
#[must_use]
pub fn build_display_name(display_name: &str, prebuild_availability: &str) -> String {
    match prebuild_availability {
        "pool" | "blob" => format!("{display_name} (Prebuild ready)"),
        _ => display_name.to_string(),
    }
}

/// The cheapest machine: fewest cpus, then least memory, then least storage.
/// Ties keep catalog order.
#[must_use]
pub fn lowest_cost(machines: &[Machine]) -> Option<&Machine> {
    machines
        .iter()
        .min_by_key(|m| (m.cpus, m.memory_in_bytes, m.storage_in_bytes))
}

/// How to pick a machine when the user named none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachinePolicy {
    /// Use the configured `machine.default`.
    Default,
    LowestCost,
    /// Ask through the chooser; cheapest machine when no prompt is possible.
    #[default]
    Interactive,
}

pub const VALID_MACHINE_POLICIES: &[&str] = &["default", "lowest-cost", "interactive"];

impl FromStr for MachinePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "lowest-cost" => Ok(Self::LowestCost),
            "interactive" => Ok(Self::Interactive),
            _ => Err(ConfigError::InvalidValue {
                key: "machine.policy".to_string(),
                value: s.to_string(),
                valid: VALID_MACHINE_POLICIES.join(", "),
            }),
        }
    }
}

impl fmt::Display for MachinePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::LowestCost => "lowest-cost",
            Self::Interactive => "interactive",
        })
    }
}
