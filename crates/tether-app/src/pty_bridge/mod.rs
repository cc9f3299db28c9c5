//! PTY bridge: runs a session's process in a pseudo-terminal and wires it
//! to the shell state.
//!
//! Output flows reader thread -> [`ShellHandle::append_output`]; input flows
//! dispatcher slot -> [`PtyBridge::write_input`]. When the process goes away
//! the reader reports `session_ended`, unless the bridge was detached on
//! purpose.
//!
//! [`ShellHandle::append_output`]: tether_session::ShellHandle::append_output

mod io;
mod spawn;

#[cfg(all(test, unix))]
mod tests;

use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use portable_pty::{Child, MasterPty};
use tether_common::SessionId;

pub use spawn::spawn_bridge;

/// Maximum bytes read from a PTY in one call (8 KB).
pub const PTY_READ_CHUNK: usize = 8_192;

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("failed to open PTY: {0}")]
    Open(String),

    #[error("failed to spawn '{program}': {message}")]
    Spawn { program: String, message: String },

    #[error("PTY io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PtyError> for tether_common::TetherError {
    fn from(e: PtyError) -> Self {
        tether_common::TetherError::Terminal(e.to_string())
    }
}

/// One attached session process.
pub struct PtyBridge {
    session: SessionId,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    /// Held so the PTY stays open while attached.
    _master: Box<dyn MasterPty + Send>,
    /// Set before a deliberate detach so the reader does not report the
    /// resulting EOF as the session ending.
    detached: Arc<AtomicBool>,
}
