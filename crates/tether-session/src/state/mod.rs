//! `ShellState`: the observable aggregate of sessions, their output, and
//! their pending input.
//!
//! Consumers read through `&self` accessors and learn about changes from
//! the [`EventBus`]; every mutation goes through a method here, bumps
//! [`ShellState::version`], and publishes what changed. Mutations that
//! touch session metadata persist synchronously. The exception is a working
//! directory reported inside the output stream: that change is held until
//! [`ShellState::flush_deferred`], so a burst of output costs at most one
//! write. Persistence failures are logged and published as
//! `Persisted { ok: false }`, never returned.


use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tether_common::{BlockId, Event, EventBus, SessionId};
use tether_config::TetherConfig;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::block::TerminalBlock;
use crate::dispatcher::{CommandDispatcher, PendingInput};
use crate::output::SessionOutput;
use crate::parser::{ParseEvent, DEFAULT_MAX_MARKER_LEN};
use crate::registry::{LoadOutcome, SessionRegistry};
use crate::session::{Session, SessionStatus};
use crate::store::SessionStore;

/// Tunables taken from the `[parser]` and `[events]` config sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellOptions {
    pub max_marker_len: usize,
    pub event_capacity: usize,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            max_marker_len: DEFAULT_MAX_MARKER_LEN,
            event_capacity: 256,
        }
    }
}

impl ShellOptions {
    pub fn from_config(config: &TetherConfig) -> Self {
        Self {
            max_marker_len: config.parser.max_marker_len as usize,
            event_capacity: config.events.capacity as usize,
        }
    }
}

pub struct ShellState {
    registry: SessionRegistry,
    outputs: HashMap<SessionId, SessionOutput>,
    dispatchers: HashMap<SessionId, CommandDispatcher>,
    favorites: Vec<PathBuf>,
    store: Option<SessionStore>,
    events: EventBus,
    version: u64,
    options: ShellOptions,
    /// Session metadata changed without being written yet.
    deferred_save: bool,
}

impl ShellState {
    /// State backed by `store`. Nothing is read until
    /// [`load_from_disk`](Self::load_from_disk).
    pub fn new(store: SessionStore, options: ShellOptions) -> Self {
        Self::build(Some(store), options)
    }

    /// State with no backing store; persistence calls succeed trivially.
    pub fn in_memory() -> Self {
        Self::build(None, ShellOptions::default())
    }

    fn build(store: Option<SessionStore>, options: ShellOptions) -> Self {
        Self {
            registry: SessionRegistry::new(),
            outputs: HashMap::new(),
            dispatchers: HashMap::new(),
            favorites: Vec::new(),
            store,
            events: EventBus::new(options.event_capacity),
            version: 0,
            options,
            deferred_save: false,
        }
    }

    // -- reads --

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Increases on every mutation. A pull-based view can compare it with
    /// the last version it rendered.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn store(&self) -> Option<&SessionStore> {
        self.store.as_ref()
    }

    pub fn sessions(&self) -> &[Session] {
        self.registry.sessions()
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.registry.get(id)
    }

    pub fn active_id(&self) -> Option<&SessionId> {
        self.registry.active_id()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.registry.active_session()
    }

    pub fn raw_output(&self, id: &SessionId) -> &[u8] {
        self.outputs.get(id).map(SessionOutput::raw).unwrap_or_default()
    }

    pub fn blocks(&self, id: &SessionId) -> &[TerminalBlock] {
        self.outputs
            .get(id)
            .map(SessionOutput::blocks)
            .unwrap_or_default()
    }

    pub fn block(&self, id: &SessionId, block: BlockId) -> Option<&TerminalBlock> {
        self.blocks(id).iter().find(|b| b.id() == block)
    }

    pub fn pending_command(&self, id: &SessionId) -> Option<&str> {
        self.dispatchers.get(id).and_then(|d| d.pending_command())
    }

    pub fn pending_control(&self, id: &SessionId) -> Option<u8> {
        self.dispatchers.get(id).and_then(|d| d.pending_control())
    }

    pub fn favorites(&self) -> &[PathBuf] {
        &self.favorites
    }

    // -- session lifecycle --

    pub fn create_session(&mut self, name: Option<String>, working_directory: Option<PathBuf>) -> Session {
        let session = self.registry.create_session(name, working_directory);
        let version = self.bump();
        self.events.publish(Event::SessionCreated {
            session: session.id().clone(),
            version,
        });
        self.publish_selection();
        self.persist_sessions();
        session
    }

    pub fn close_session(&mut self, id: &SessionId) -> bool {
        let was_active = self.registry.active_id().cloned();
        if !self.registry.close_session(id) {
            return false;
        }
        let version = self.bump();
        self.events.publish(Event::SessionClosed {
            session: id.clone(),
            version,
        });
        if self.registry.active_id() != was_active.as_ref() {
            self.publish_selection();
        }
        self.persist_sessions();
        true
    }

    /// Selection only moves the in-memory pointer; it is not persisted.
    pub fn select_session(&mut self, id: &SessionId) -> bool {
        if !self.registry.select_session(id) {
            return false;
        }
        self.bump();
        self.publish_selection();
        true
    }

    pub fn set_session_status(&mut self, id: &SessionId, status: SessionStatus) -> bool {
        if status == SessionStatus::Terminated {
            return self.close_session(id);
        }
        if !self.registry.set_status(id, status) {
            return false;
        }
        self.session_updated(id);
        true
    }

    pub fn update_working_directory(&mut self, id: &SessionId, path: PathBuf) -> bool {
        if !self.registry.update_working_directory(id, path) {
            return false;
        }
        self.session_updated(id);
        true
    }

    pub fn rename_session(&mut self, id: &SessionId, name: impl Into<String>) -> bool {
        if !self.registry.rename_session(id, name.into()) {
            return false;
        }
        self.session_updated(id);
        true
    }

    /// Purges a session and drops its output and pending input.
    pub fn delete_session(&mut self, id: &SessionId) -> bool {
        let was_active = self.registry.active_id().cloned();
        if !self.registry.delete_session(id) {
            return false;
        }
        self.outputs.remove(id);
        self.dispatchers.remove(id);
        let version = self.bump();
        self.events.publish(Event::SessionDeleted {
            session: id.clone(),
            version,
        });
        if self.registry.active_id() != was_active.as_ref() {
            self.publish_selection();
        }
        self.persist_sessions();
        true
    }

    /// The PTY behind a session went away: finish its output and mark it
    /// terminated. The detached process itself is not touched.
    pub fn session_ended(&mut self, id: &SessionId) {
        info!(session = %id, "Session ended");
        self.flush_output(id);
        self.close_session(id);
    }

    // -- persistence --

    /// Replaces sessions and favorites with the stored ones. Always leaves
    /// at least one usable session.
    pub fn load_from_disk(&mut self) -> LoadOutcome {
        let outcome = match &self.store {
            Some(store) => {
                let outcome = self.registry.load_from_disk(store);
                self.favorites = match store.load_favorites() {
                    Ok(favorites) => favorites,
                    Err(e) => {
                        warn!(error = %e, "Failed to load favorites");
                        Vec::new()
                    }
                };
                outcome
            }
            None => LoadOutcome {
                restored: self.registry.len(),
                synthesized_default: self.registry.ensure_usable_session(),
                recovered_from_corruption: false,
            },
        };

        let registry = &self.registry;
        self.outputs.retain(|id, _| registry.get(id).is_some());
        self.dispatchers.retain(|id, _| registry.get(id).is_some());

        self.bump();
        self.publish_selection();
        let version = self.version;
        self.events.publish(Event::FavoritesChanged { version });
        if outcome.synthesized_default || outcome.recovered_from_corruption {
            self.persist_sessions();
        }
        outcome
    }

    /// Writes the session list now. Returns whether it reached disk.
    pub fn save_to_disk(&mut self) -> bool {
        self.persist_sessions()
    }

    /// Writes session metadata held back by output-driven updates. Returns
    /// whether a write was attempted.
    pub fn flush_deferred(&mut self) -> bool {
        if !self.deferred_save {
            return false;
        }
        self.persist_sessions();
        true
    }

    pub fn has_deferred_save(&self) -> bool {
        self.deferred_save
    }

    /// Hot-reload "prepare": flush session metadata and favorites. Output
    /// buffers are not persisted; they come back by reattaching.
    pub fn prepare_for_reload(&mut self) -> bool {
        debug!("Preparing for reload");
        let sessions = self.persist_sessions();
        let favorites = self.persist_favorites();
        sessions && favorites
    }

    /// Hot-reload "restore". In-memory state survives a reload, so there is
    /// nothing to do.
    pub fn restore_after_reload(&mut self) {
        debug!(version = self.version, "Restored after reload");
    }

    /// Teardown: final flush, then tell subscribers to stop.
    pub fn shutdown(&mut self) -> bool {
        let ok = self.prepare_for_reload();
        self.events.publish(Event::Shutdown);
        info!(ok, "Shell state shut down");
        ok
    }

    // -- output --

    /// Appends PTY output in arrival order. Unknown sessions are ignored.
    /// Output for a terminated session is still recorded.
    pub fn append_output(&mut self, id: &SessionId, bytes: &[u8]) -> bool {
        if self.registry.get(id).is_none() {
            debug!(session = %id, len = bytes.len(), "output for unknown session dropped");
            return false;
        }
        let max_marker_len = self.options.max_marker_len;
        let events = self
            .outputs
            .entry(id.clone())
            .or_insert_with(|| SessionOutput::new(max_marker_len))
            .append(bytes);

        let version = self.bump();
        self.events.publish(Event::OutputAppended {
            session: id.clone(),
            bytes: bytes.len(),
            version,
        });
        self.apply_parse_events(id, events);
        true
    }

    /// End of stream for the session's parser.
    pub fn flush_output(&mut self, id: &SessionId) {
        let Some(output) = self.outputs.get_mut(id) else {
            return;
        };
        let events = output.flush();
        if !events.is_empty() {
            self.bump();
            self.apply_parse_events(id, events);
        }
    }

    /// Clears raw bytes and blocks together.
    pub fn clear_output(&mut self, id: &SessionId) -> bool {
        if self.registry.get(id).is_none() {
            return false;
        }
        if let Some(output) = self.outputs.get_mut(id) {
            output.clear();
        }
        let version = self.bump();
        self.events.publish(Event::OutputCleared {
            session: id.clone(),
            version,
        });
        true
    }

    fn apply_parse_events(&mut self, id: &SessionId, events: Vec<ParseEvent>) {
        let mut changed: Vec<BlockId> = Vec::new();
        for event in events {
            match event {
                ParseEvent::WorkingDirectory(path) => {
                    if self.registry.update_working_directory(id, path) {
                        let version = self.bump();
                        self.events.publish(Event::SessionUpdated {
                            session: id.clone(),
                            version,
                        });
                        self.deferred_save = self.store.is_some();
                    }
                }
                other => {
                    if let Some(block) = other.block_id() {
                        if !changed.contains(&block) {
                            changed.push(block);
                        }
                    }
                }
            }
        }
        if !changed.is_empty() {
            self.events.publish(Event::BlocksChanged {
                session: id.clone(),
                blocks: changed,
                version: self.version,
            });
        }
    }

    // -- input --

    /// Queues a text command, replacing any undelivered one. Refused for
    /// unknown and terminated sessions.
    pub fn send_command(&mut self, id: &SessionId, text: &str) -> bool {
        if !self.accepts_input(id) {
            return false;
        }
        let replaced = self.dispatchers.entry(id.clone()).or_default().send_command(text);
        if replaced {
            debug!(session = %id, "pending command replaced");
        }
        let version = self.bump();
        self.events.publish(Event::CommandQueued {
            session: id.clone(),
            version,
        });
        true
    }

    /// [`send_command`](Self::send_command) to the active session.
    pub fn send_command_to_active(&mut self, text: &str) -> Option<SessionId> {
        let id = self.registry.active_id()?.clone();
        self.send_command(&id, text).then_some(id)
    }

    pub fn send_control_character(&mut self, id: &SessionId, byte: u8) -> bool {
        if !self.accepts_input(id) {
            return false;
        }
        self.dispatchers
            .entry(id.clone())
            .or_default()
            .send_control_character(byte);
        let version = self.bump();
        self.events.publish(Event::ControlQueued {
            session: id.clone(),
            byte,
            version,
        });
        true
    }

    pub fn take_pending_command(&mut self, id: &SessionId) -> Option<String> {
        self.dispatchers.get_mut(id)?.take_command()
    }

    pub fn take_control_character(&mut self, id: &SessionId) -> Option<u8> {
        self.dispatchers.get_mut(id)?.take_control()
    }

    /// What the PTY writer should send next: control byte before text.
    pub fn take_next_input(&mut self, id: &SessionId) -> Option<PendingInput> {
        self.dispatchers.get_mut(id)?.take_next()
    }

    fn accepts_input(&self, id: &SessionId) -> bool {
        match self.registry.get(id) {
            Some(session) if !session.is_terminated() => true,
            Some(_) => {
                debug!(session = %id, "input to terminated session refused");
                false
            }
            None => {
                debug!(session = %id, "input to unknown session refused");
                false
            }
        }
    }

    // -- favorites --

    pub fn add_favorite(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.favorites.contains(&path) {
            return false;
        }
        self.favorites.push(path);
        self.favorites_changed();
        true
    }

    pub fn remove_favorite(&mut self, path: &Path) -> bool {
        let before = self.favorites.len();
        self.favorites.retain(|p| p != path);
        if self.favorites.len() == before {
            return false;
        }
        self.favorites_changed();
        true
    }

    // -- helpers --

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn publish_selection(&self) {
        self.events.publish(Event::SessionSelected {
            session: self.registry.active_id().cloned(),
            version: self.version,
        });
    }

    fn session_updated(&mut self, id: &SessionId) {
        let version = self.bump();
        self.events.publish(Event::SessionUpdated {
            session: id.clone(),
            version,
        });
        self.persist_sessions();
    }

    fn favorites_changed(&mut self) {
        let version = self.bump();
        self.events.publish(Event::FavoritesChanged { version });
        self.persist_favorites();
    }

    fn persist_sessions(&mut self) -> bool {
        self.deferred_save = false;
        let Some(store) = &self.store else {
            return true;
        };
        let ok = self.registry.save_to_disk(store);
        self.events.publish(Event::Persisted { ok });
        ok
    }

    fn persist_favorites(&self) -> bool {
        let Some(store) = &self.store else {
            return true;
        };
        let ok = match store.save_favorites(&self.favorites) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to save favorites");
                false
            }
        };
        self.events.publish(Event::Persisted { ok });
        ok
    }
}
