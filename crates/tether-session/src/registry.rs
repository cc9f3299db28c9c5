//! The session list, the active-session pointer, and lifecycle transitions.

use std::collections::HashSet;
use std::path::PathBuf;

use tether_common::{SessionId, StoreError};
use tracing::{debug, info, warn};

use crate::session::{Session, SessionStatus};
use crate::store::SessionStore;

/// What [`SessionRegistry::load_from_disk`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOutcome {
    /// Records read from the store.
    pub restored: usize,
    /// A default session was created because nothing selectable was loaded.
    pub synthesized_default: bool,
    /// The session file could not be decoded and was set aside.
    pub recovered_from_corruption: bool,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
    active: Option<SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }

    pub fn active_id(&self) -> Option<&SessionId> {
        self.active.as_ref()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Appends a new session and makes it active.
    ///
    /// Defaults: name `Session {N+1}` where N counts every session in
    /// history, working directory from [`tether_platform::default_working_directory`].
    pub fn create_session(&mut self, name: Option<String>, working_directory: Option<PathBuf>) -> Session {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Session {}", self.sessions.len() + 1));
        let working_directory =
            working_directory.unwrap_or_else(tether_platform::default_working_directory);

        let session = Session::new(name, working_directory);
        info!(session = %session.id, name = %session.name, "Session created");
        self.active = Some(session.id.clone());
        self.sessions.push(session.clone());
        session
    }

    /// Marks a session terminated. If it was active, the first remaining
    /// selectable session in insertion order becomes active.
    ///
    /// Returns whether anything changed; an unknown id is a no-op.
    pub fn close_session(&mut self, id: &SessionId) -> bool {
        let Some(session) = self.get_mut(id) else {
            debug!(session = %id, "close: unknown session");
            return false;
        };
        let mut changed = false;
        if session.status != SessionStatus::Terminated {
            session.status = SessionStatus::Terminated;
            changed = true;
            info!(session = %id, "Session closed");
        }
        if self.active.as_ref() == Some(id) {
            self.reassign_active();
            changed = true;
        }
        changed
    }

    /// Points the active pointer at `id`, whatever its status. Unknown ids
    /// are ignored. Returns whether the pointer moved.
    pub fn select_session(&mut self, id: &SessionId) -> bool {
        if self.get(id).is_none() {
            debug!(session = %id, "select: unknown session");
            return false;
        }
        if self.active.as_ref() == Some(id) {
            return false;
        }
        self.active = Some(id.clone());
        true
    }

    /// Moves a session between `active` and `idle`. Terminated sessions
    /// stay terminated; setting `Terminated` is the same as closing.
    pub fn set_status(&mut self, id: &SessionId, status: SessionStatus) -> bool {
        if status == SessionStatus::Terminated {
            return self.close_session(id);
        }
        match self.get_mut(id) {
            Some(session) if session.status == SessionStatus::Terminated => {
                debug!(session = %id, ?status, "refusing to revive terminated session");
                false
            }
            Some(session) if session.status != status => {
                session.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn update_working_directory(&mut self, id: &SessionId, path: PathBuf) -> bool {
        match self.get_mut(id) {
            Some(session) if session.working_directory != path => {
                debug!(session = %id, path = %path.display(), "Working directory changed");
                session.working_directory = path;
                true
            }
            _ => false,
        }
    }

    pub fn rename_session(&mut self, id: &SessionId, name: String) -> bool {
        if name.trim().is_empty() {
            return false;
        }
        match self.get_mut(id) {
            Some(session) if session.name != name => {
                session.name = name;
                true
            }
            _ => false,
        }
    }

    /// Purges a session from history.
    pub fn delete_session(&mut self, id: &SessionId) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| &s.id != id);
        if self.sessions.len() == before {
            debug!(session = %id, "delete: unknown session");
            return false;
        }
        if self.active.as_ref() == Some(id) {
            self.reassign_active();
        }
        info!(session = %id, "Session deleted");
        true
    }

    fn reassign_active(&mut self) {
        self.active = self
            .sessions
            .iter()
            .find(|s| s.status.is_selectable())
            .map(|s| s.id.clone());
    }

    /// Creates a default session when no selectable session is active.
    /// Returns whether one was created.
    pub fn ensure_usable_session(&mut self) -> bool {
        if self.active_session().is_some_and(|s| s.status.is_selectable()) {
            return false;
        }
        self.reassign_active();
        if self.active.is_some() {
            return false;
        }
        self.create_session(None, None);
        true
    }

    /// Replaces the in-memory list with the persisted one.
    ///
    /// Never fails: an unreadable store is logged and treated as empty, and
    /// when nothing selectable was loaded a fresh default session is
    /// appended so there is always one usable session.
    pub fn load_from_disk(&mut self, store: &SessionStore) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        let loaded = match store.load_sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "Failed to load sessions, starting fresh");
                if matches!(e, StoreError::Decode { .. }) {
                    store.quarantine_sessions();
                    outcome.recovered_from_corruption = true;
                }
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        self.sessions = loaded
            .into_iter()
            .filter(|s| seen.insert(s.id.clone()))
            .collect();
        outcome.restored = self.sessions.len();
        self.reassign_active();
        outcome.synthesized_default = self.ensure_usable_session();
        info!(
            restored = outcome.restored,
            synthesized_default = outcome.synthesized_default,
            "Sessions loaded"
        );
        outcome
    }

    /// Writes the full list. Failures are logged and reported as `false`;
    /// the in-memory list stays authoritative.
    pub fn save_to_disk(&self, store: &SessionStore) -> bool {
        match store.save_sessions(&self.sessions) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to save sessions");
                false
            }
        }
    }
}
