//! Session, storage, parser, and event configuration types.

use serde::{Deserialize, Serialize};

/// How sessions are backed by processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Run each session inside a detachable multiplexer socket so it
    /// survives application restarts.
    pub detach: bool,
    /// Multiplexer binary used when `detach` is on.
    pub tmux_program: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            detach: true,
            tmux_program: "tmux".into(),
        }
    }
}

/// Where session and favorites records are stored.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the data directory. `None` uses the platform default.
    pub data_dir: Option<String>,
}

/// Block parser limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Longest OSC sequence (in bytes) still considered a candidate marker.
    /// Longer unterminated sequences are treated as literal output.
    pub max_marker_len: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_marker_len: 1024,
        }
    }
}

/// Change-notification channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity; slow subscribers lag past this.
    pub capacity: u32,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}
