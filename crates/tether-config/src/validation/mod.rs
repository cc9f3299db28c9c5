//! Full configuration validation.
//!
//! Each check pushes onto a shared error list; the orchestrator folds them
//! into a single `ConfigError`.

mod helpers;


use crate::schema::TetherConfig;
use tether_common::ConfigError;

use helpers::{validate_non_empty, validate_range};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TetherConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(
        &mut errors,
        "parser.max_marker_len",
        config.parser.max_marker_len,
        16,
        65_536,
    );
    validate_range(&mut errors, "events.capacity", config.events.capacity, 1, 65_536);

    if config.sessions.detach {
        validate_non_empty(
            &mut errors,
            "sessions.tmux_program",
            &config.sessions.tmux_program,
        );
    }

    if let Some(dir) = &config.storage.data_dir {
        validate_non_empty(&mut errors, "storage.data_dir", dir);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
