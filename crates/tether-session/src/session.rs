//! The session record: one addressable terminal/agent context.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tether_common::SessionId;

/// Lifecycle status of a session.
///
/// `Terminated` is a display status, not a process signal: the detached
/// process behind the session may still be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Idle,
    Terminated,
}

impl SessionStatus {
    /// Whether a session with this status can become the active session
    /// through automatic reassignment.
    pub fn is_selectable(self) -> bool {
        !matches!(self, SessionStatus::Terminated)
    }
}

/// One terminal session as it is held in memory and persisted to disk.
///
/// Serialized field order is the on-disk key order:
/// `{id, name, workingDirectory, status, createdAt}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) name: String,
    pub(crate) working_directory: PathBuf,
    pub(crate) status: SessionStatus,
    pub(crate) created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh `Active` session with a newly allocated id.
    ///
    /// The timestamp is truncated to milliseconds so it survives a
    /// persist/reload round-trip unchanged.
    pub fn new(name: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            id: SessionId::new(),
            name: name.into(),
            working_directory: working_directory.into(),
            status: SessionStatus::Active,
            created_at: Utc::now().trunc_subsecs(3),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_terminated(&self) -> bool {
        self.status == SessionStatus::Terminated
    }
}
