//! Reading and validating a config file.

use std::io::ErrorKind;
use std::path::Path;

use tether_common::ConfigError;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};
use crate::schema::TetherConfig;
use crate::validation;

fn read_config_text(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
        _ => ConfigError::ParseError(format!("cannot read {}: {e}", path.display())),
    })
}

/// Loads `path`. Absent keys take their defaults; a file that parses but
/// has out-of-range values yields the default config with a warning.
pub fn load_from_path(path: &Path) -> Result<TetherConfig, ConfigError> {
    let text = read_config_text(path)?;
    let config: TetherConfig = toml::from_str(&text)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;

    match validation::validate(&config) {
        Ok(()) => {
            info!(path = %path.display(), "config loaded");
            Ok(config)
        }
        Err(e) => {
            warn!(path = %path.display(), "{e}; using default config");
            Ok(TetherConfig::default())
        }
    }
}

/// Loads the default config file, seeding it first if it is missing.
pub fn load_default() -> Result<TetherConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(TetherConfig::default())
        }
        result => result,
    }
}
