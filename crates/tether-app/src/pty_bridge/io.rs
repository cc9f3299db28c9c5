//! PTY I/O: write input, detach.

use std::io::Write;
use std::sync::atomic::Ordering;

use tether_session::PendingInput;
use tracing::debug;

use super::{PtyBridge, PtyError};

impl PtyBridge {
    /// Writes raw bytes to the process.
    pub fn write_input(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes one item taken from the session's dispatcher.
    pub fn deliver(&mut self, input: PendingInput) -> Result<(), PtyError> {
        debug!(session = %self.session, ?input, "delivering input");
        self.write_input(&input.into_bytes())
    }

    /// Stops this attachment without ending the session. For a detachable
    /// session only the multiplexer client exits; the shell keeps running.
    pub fn detach(mut self) {
        self.detached.store(true, Ordering::SeqCst);
        if let Err(e) = self.child.kill() {
            debug!(session = %self.session, "PTY kill error (may already be dead): {e}");
        }
        let _ = self.child.wait();
    }
}
