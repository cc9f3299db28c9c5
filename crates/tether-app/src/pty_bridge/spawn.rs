//! Spawning a session's process from its [`LaunchSpec`].

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tether_common::SessionId;
use tether_session::{LaunchSpec, ShellHandle};
use tracing::{debug, info, warn};

use super::{PtyBridge, PtyError, PTY_READ_CHUNK};

fn build_command(spec: &LaunchSpec) -> CommandBuilder {
    let mut cmd = CommandBuilder::new(&spec.program);
    cmd.args(&spec.args);
    cmd.cwd(&spec.cwd);
    cmd.env_clear();
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    cmd
}

/// Opens a PTY, starts `spec` in it, and starts the reader thread that
/// forwards output for `session` to `handle`.
pub fn spawn_bridge(
    spec: &LaunchSpec,
    session: SessionId,
    handle: ShellHandle,
    cols: u16,
    rows: u16,
) -> Result<PtyBridge, PtyError> {
    let size = PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    };
    let pair = native_pty_system()
        .openpty(size)
        .map_err(|e| PtyError::Open(e.to_string()))?;

    let child = pair
        .slave
        .spawn_command(build_command(spec))
        .map_err(|e| PtyError::Spawn {
            program: spec.program.clone(),
            message: e.to_string(),
        })?;
    drop(pair.slave);

    let writer = pair
        .master
        .take_writer()
        .map_err(|e| PtyError::Open(format!("take writer: {e}")))?;
    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| PtyError::Open(format!("clone reader: {e}")))?;

    let detached = Arc::new(AtomicBool::new(false));
    thread::Builder::new()
        .name(format!("pty-reader-{session}"))
        .spawn({
            let session = session.clone();
            let detached = Arc::clone(&detached);
            move || read_loop(reader, session, handle, detached)
        })?;

    info!(session = %session, program = %spec.program, "PTY attached");
    Ok(PtyBridge {
        session,
        writer,
        child,
        _master: pair.master,
        detached,
    })
}

fn read_loop(
    mut reader: Box<dyn Read + Send>,
    session: SessionId,
    handle: ShellHandle,
    detached: Arc<AtomicBool>,
) {
    let mut buf = [0u8; PTY_READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if handle.append_output(&session, buf[..n].to_vec()).is_err() {
                    debug!(session = %session, "shell state gone, stopping reader");
                    return;
                }
            }
            Err(e) => {
                debug!(session = %session, "PTY reader error: {e}");
                break;
            }
        }
    }
    if detached.load(Ordering::SeqCst) {
        debug!(session = %session, "PTY closed after detach");
        return;
    }
    if let Err(e) = handle.session_ended(&session) {
        warn!(session = %session, error = %e, "could not report session end");
    }
}
