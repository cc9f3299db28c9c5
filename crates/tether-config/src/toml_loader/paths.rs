//! Where the config file lives, and seeding it on first run.

use std::path::{Path, PathBuf};

use tether_common::{atomic_write, ConfigError};
use tracing::info;

use super::template::default_config_toml;

/// Environment variable that points Tether at a different config file.
pub const CONFIG_ENV: &str = "TETHER_CONFIG";

/// `$TETHER_CONFIG` when set and non-empty, else `<config dir>/tether/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("tether").join("config.toml"))
        .ok_or_else(|| ConfigError::ParseError("no config directory on this platform".into()))
}

/// Seeds `path` with the commented template. An existing file is left alone.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Ok(());
    }
    atomic_write(path, default_config_toml().as_bytes()).map_err(|e| {
        ConfigError::ParseError(format!("cannot seed {}: {e}", path.display()))
    })?;
    info!(path = %path.display(), "wrote default config");
    Ok(())
}
