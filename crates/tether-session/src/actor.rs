//! Single-owner task for [`ShellState`].
//!
//! The state is moved into one tokio task. Every other thread (PTY
//! readers, the CLI, a UI) talks to it through a cloneable [`ShellHandle`]
//! over one FIFO channel, so output for a session is applied in exactly the
//! order the reader sent it.

use tether_common::{Event, EventBus, SessionId, TetherError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::state::ShellState;

type ApplyFn = Box<dyn FnOnce(&mut ShellState) + Send>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub enum ShellCommand {
    AppendOutput { session: SessionId, bytes: Vec<u8> },
    SessionEnded { session: SessionId },
    /// Run a closure against the state on the owner task.
    Apply(ApplyFn),
    Shutdown { reply: oneshot::Sender<bool> },
}

impl std::fmt::Debug for ShellCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShellCommand::AppendOutput { session, bytes } => f
                .debug_struct("AppendOutput")
                .field("session", session)
                .field("len", &bytes.len())
                .finish(),
            ShellCommand::SessionEnded { session } => {
                f.debug_struct("SessionEnded").field("session", session).finish()
            }
            ShellCommand::Apply(_) => f.write_str("Apply(..)"),
            ShellCommand::Shutdown { .. } => f.write_str("Shutdown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cheap, cloneable handle to the owner task.
#[derive(Clone)]
pub struct ShellHandle {
    command_tx: mpsc::UnboundedSender<ShellCommand>,
    events: EventBus,
}

impl ShellHandle {
    /// Moves `state` onto a new task. The join handle yields the state back
    /// once the task stops.
    pub fn spawn(state: ShellState) -> (Self, JoinHandle<ShellState>) {
        let events = state.event_bus().clone();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(owner_loop(state, command_rx));
        (Self { command_tx, events }, task)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn send(&self, command: ShellCommand) -> Result<(), TetherError> {
        self.command_tx
            .send(command)
            .map_err(|_| TetherError::StateClosed("shell task has stopped".into()))
    }

    /// Non-blocking; callable from any thread, including PTY readers.
    pub fn append_output(&self, session: &SessionId, bytes: Vec<u8>) -> Result<(), TetherError> {
        self.send(ShellCommand::AppendOutput {
            session: session.clone(),
            bytes,
        })
    }

    pub fn session_ended(&self, session: &SessionId) -> Result<(), TetherError> {
        self.send(ShellCommand::SessionEnded {
            session: session.clone(),
        })
    }

    /// Runs `f` on the owner task and returns its result.
    pub async fn call<R, F>(&self, f: F) -> Result<R, TetherError>
    where
        F: FnOnce(&mut ShellState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let reply = self.dispatch(f)?;
        reply
            .await
            .map_err(|_| TetherError::StateClosed("shell task dropped the reply".into()))
    }

    /// [`call`](Self::call) for plain threads. Must not be used from inside
    /// the runtime.
    pub fn call_blocking<R, F>(&self, f: F) -> Result<R, TetherError>
    where
        F: FnOnce(&mut ShellState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let reply = self.dispatch(f)?;
        reply
            .blocking_recv()
            .map_err(|_| TetherError::StateClosed("shell task dropped the reply".into()))
    }

    fn dispatch<R, F>(&self, f: F) -> Result<oneshot::Receiver<R>, TetherError>
    where
        F: FnOnce(&mut ShellState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ShellCommand::Apply(Box::new(move |state| {
            let _ = reply_tx.send(f(state));
        })))?;
        Ok(reply_rx)
    }

    /// Final flush, then stop the task. Returns whether the flush reached
    /// disk.
    pub async fn shutdown(&self) -> Result<bool, TetherError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(ShellCommand::Shutdown { reply })?;
        reply_rx
            .await
            .map_err(|_| TetherError::StateClosed("shell task dropped the reply".into()))
    }
}

// ---------------------------------------------------------------------------
// Owner loop
// ---------------------------------------------------------------------------

/// Whether the loop should keep running after `command`.
fn handle(state: &mut ShellState, command: ShellCommand) -> bool {
    match command {
        ShellCommand::AppendOutput { session, bytes } => {
            state.append_output(&session, &bytes);
        }
        ShellCommand::SessionEnded { session } => state.session_ended(&session),
        ShellCommand::Apply(f) => f(state),
        ShellCommand::Shutdown { reply } => {
            let ok = state.shutdown();
            let _ = reply.send(ok);
            return false;
        }
    }
    true
}

async fn owner_loop(mut state: ShellState, mut command_rx: mpsc::UnboundedReceiver<ShellCommand>) -> ShellState {
    while let Some(command) = command_rx.recv().await {
        if !handle(&mut state, command) {
            return state;
        }
        // Drain what is already queued before writing held-back metadata.
        while let Ok(command) = command_rx.try_recv() {
            if !handle(&mut state, command) {
                return state;
            }
        }
        state.flush_deferred();
    }
    debug!("All shell handles dropped, flushing");
    state.shutdown();
    state
}
