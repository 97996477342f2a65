//! Domain types and validators for CLI configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::machine::{MachinePolicy, VALID_MACHINE_POLICIES};

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "api.url",
    "api.web_url",
    "api.locations_url",
    "machine.policy",
    "machine.default",
    "poll.interval_ms",
    "poll.timeout_secs",
    "poll.max_retries",
];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.codespace/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CliConfig {
    pub api: ApiConfig,
    pub machine: MachineConfig,
    pub poll: PollConfig,
}

/// Remote service endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API root.
    pub url: String,
    /// Web root serving `<login>.keys`.
    pub web_url: String,
    /// Region lookup endpoint.
    pub locations_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "https://api.github.com".to_string(),
            web_url: "https://github.com".to_string(),
            locations_url: "https://online.visualstudio.com/api/v1/locations".to_string(),
        }
    }
}

/// Machine selection when `--machine` is not given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MachineConfig {
    pub policy: MachinePolicy,
    /// Used by the `default` policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Readiness polling cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub timeout_secs: u64,
    /// Consecutive failed polls tolerated before giving up.
    pub max_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            timeout_secs: 600,
            max_retries: 3,
        }
    }
}

impl PollConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CliConfig {
    /// Reads a setting by its dotted key.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys.
    pub fn get(&self, key: &str) -> Result<String> {
        validate_config_key(key)?;
        Ok(match key {
            "api.url" => self.api.url.clone(),
            "api.web_url" => self.api.web_url.clone(),
            "api.locations_url" => self.api.locations_url.clone(),
            "machine.policy" => self.machine.policy.to_string(),
            "machine.default" => self.machine.default.clone().unwrap_or_default(),
            "poll.interval_ms" => self.poll.interval_ms.to_string(),
            "poll.timeout_secs" => self.poll.timeout_secs.to_string(),
            "poll.max_retries" => self.poll.max_retries.to_string(),
            _ => anyhow::bail!("Unknown setting: {key}"),
        })
    }

    /// Writes a setting by its dotted key after validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        validate_config_value(key, value)?;
        match key {
            "api.url" => self.api.url = value.trim_end_matches('/').to_string(),
            "api.web_url" => self.api.web_url = value.trim_end_matches('/').to_string(),
            "api.locations_url" => self.api.locations_url = value.to_string(),
            "machine.policy" => self.machine.policy = value.parse()?,
            "machine.default" => {
                self.machine.default = (!value.is_empty()).then(|| value.to_string());
            }
            "poll.interval_ms" => self.poll.interval_ms = value.parse()?,
            "poll.timeout_secs" => self.poll.timeout_secs = value.parse()?,
            "poll.max_retries" => self.poll.max_retries = value.parse()?,
            _ => anyhow::bail!("Unknown setting: {key}"),
        }
        Ok(())
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let invalid = |valid: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        valid: valid.to_string(),
    };
    match key {
        "api.url" | "api.web_url" | "api.locations_url" => {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                return Err(invalid("an http:// or https:// URL").into());
            }
        }
        "machine.policy" => {
            if !VALID_MACHINE_POLICIES.contains(&value) {
                return Err(invalid(&VALID_MACHINE_POLICIES.join(", ")).into());
            }
        }
        "poll.interval_ms" | "poll.timeout_secs" => {
            if !value.parse::<u64>().is_ok_and(|v| v > 0) {
                return Err(invalid("a positive integer").into());
            }
        }
        "poll.max_retries" => {
            if value.parse::<u32>().is_err() {
                return Err(invalid("a non-negative integer").into());
            }
        }
        _ => {}
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
