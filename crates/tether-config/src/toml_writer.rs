//! Write TetherConfig to TOML on disk.

use std::path::Path;

use tether_common::ConfigError;

use crate::schema::TetherConfig;
use crate::toml_loader::default_config_path;

/// Write config to the platform default path (`~/.config/tether/config.toml`).
pub fn save_config(config: &TetherConfig) -> Result<(), ConfigError> {
    let path = default_config_path()?;
    save_config_to_path(config, &path)
}

/// Write config to a specific path using an atomic write.
pub fn save_config_to_path(config: &TetherConfig, path: &Path) -> Result<(), ConfigError> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ConfigError::ParseError(format!("failed to serialize config to TOML: {e}")))?;

    tether_common::atomic_write(path, toml_str.as_bytes()).map_err(|e| {
        ConfigError::ParseError(format!("failed to write config to {}: {e}", path.display()))
    })?;

    tracing::debug!(path = %path.display(), "Config saved to disk");
    Ok(())
}
