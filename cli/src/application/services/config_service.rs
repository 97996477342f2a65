//! Application service: configuration use-cases.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::CliConfig;

/// Load configuration.
///
/// # Errors
///
/// Returns an error if the backing file exists but cannot be read or parsed.
pub fn load_config(store: &impl ConfigStore) -> Result<CliConfig> {
    store.load()
}

/// Save configuration.
///
/// # Errors
///
/// Returns an error if the backing file cannot be written.
pub fn save_config(store: &impl ConfigStore, config: &CliConfig) -> Result<()> {
    store.save(config)
}

/// Validate and persist one setting. Returns the updated configuration.
///
/// # Errors
///
/// Returns an error for unknown keys, invalid values, or I/O failures.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<CliConfig> {
    let mut config = load_config(store)?;
    config.set(key, value)?;
    save_config(store, &config)?;
    Ok(config)
}
