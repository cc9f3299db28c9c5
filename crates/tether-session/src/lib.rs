//! Session/terminal core for Tether.
//!
//! Keeps interactive terminal sessions addressable across restarts and
//! turns each session's raw output into a structured list of blocks.
//! [`ShellState`] is the single aggregate consumers read from; share it
//! across threads through [`ShellHandle`].

pub mod actor;
pub mod block;
pub mod dispatcher;
pub mod output;
pub mod parser;
pub mod pty;
pub mod registry;
pub mod session;
pub mod state;
pub mod store;

pub use actor::{ShellCommand, ShellHandle};
pub use block::{BlockKind, TerminalBlock};
pub use dispatcher::{CommandDispatcher, ControlKey, PendingInput};
pub use output::SessionOutput;
pub use parser::{BlockParser, ParseEvent};
pub use pty::{launch_spec, socket_name, socket_path, LaunchSpec};
pub use registry::{LoadOutcome, SessionRegistry};
pub use session::{Session, SessionStatus};
pub use state::{ShellOptions, ShellState};
pub use store::SessionStore;
