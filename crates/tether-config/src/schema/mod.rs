//! Configuration schema types for Tether.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod sessions;
mod shell;
mod system;

pub use sessions::*;
pub use shell::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Tether.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct TetherConfig {
    pub shell: ShellConfig,
    pub sessions: SessionsConfig,
    pub storage: StorageConfig,
    pub parser: ParserConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}
