//! On-disk session and favorites records.
//!
//! Two JSON files in one directory: `sessions.json` (ordered session
//! records) and `favorites.json` (ordered directory paths). The store only
//! moves bytes; recovery policy lives in the registry.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tether_common::{atomic_write, PlatformError, StoreError};
use tracing::{debug, warn};

use crate::session::Session;

const SESSIONS_FILE: &str = "sessions.json";
const FAVORITES_FILE: &str = "favorites.json";

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the platform data directory.
    pub fn at_default_location() -> Result<Self, PlatformError> {
        Ok(Self::new(tether_platform::data_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.dir.join(SESSIONS_FILE)
    }

    pub fn favorites_path(&self) -> PathBuf {
        self.dir.join(FAVORITES_FILE)
    }

    /// Reads the session list. An absent or blank file is an empty list.
    pub fn load_sessions(&self) -> Result<Vec<Session>, StoreError> {
        Ok(read_json(&self.sessions_path())?.unwrap_or_default())
    }

    pub fn save_sessions(&self, sessions: &[Session]) -> Result<(), StoreError> {
        write_json(&self.sessions_path(), sessions)
    }

    pub fn load_favorites(&self) -> Result<Vec<PathBuf>, StoreError> {
        Ok(read_json(&self.favorites_path())?.unwrap_or_default())
    }

    pub fn save_favorites(&self, favorites: &[PathBuf]) -> Result<(), StoreError> {
        write_json(&self.favorites_path(), favorites)
    }

    /// Moves an undecodable session file aside as `sessions.json.corrupt`
    /// so the next save does not destroy it.
    pub fn quarantine_sessions(&self) -> Option<PathBuf> {
        let path = self.sessions_path();
        let target = path.with_extension("json.corrupt");
        match fs::rename(&path, &target) {
            Ok(()) => {
                warn!(path = %target.display(), "Quarantined unreadable session file");
                Some(target)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to quarantine session file");
                None
            }
        }
    }
}

/// `Ok(None)` when the file does not exist or holds only whitespace.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No store file yet");
            return Ok(None);
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };
    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|e| StoreError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut json =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Encode(e.to_string()))?;
    json.push('\n');
    atomic_write(path, json.as_bytes()).map_err(|e| StoreError::io(path, e))?;
    debug!(path = %path.display(), "Store file written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    #[test]
    fn missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load_sessions().unwrap().is_empty());
        assert!(store.load_favorites().unwrap().is_empty());
    }

    #[test]
    fn blank_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(store.sessions_path(), "  \n").unwrap();
        assert!(store.load_sessions().unwrap().is_empty());
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(store.sessions_path(), b"[{\"id\":\"a\",\"name\":\"\xff\"}]").unwrap();
        assert!(matches!(
            store.load_sessions(),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn sessions_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested"));
        let mut closed = Session::new("two", "/srv");
        closed.status = SessionStatus::Terminated;
        let sessions = vec![Session::new("one", "/tmp"), closed];

        store.save_sessions(&sessions).unwrap();
        assert_eq!(store.load_sessions().unwrap(), sessions);
        assert!(!store.sessions_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(store.sessions_path(), "{ not json").unwrap();
        assert!(matches!(
            store.load_sessions(),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn quarantine_moves_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(store.sessions_path(), "garbage").unwrap();

        let moved = store.quarantine_sessions().unwrap();
        assert!(!store.sessions_path().exists());
        assert_eq!(fs::read_to_string(moved).unwrap(), "garbage");
    }

    #[test]
    fn favorites_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let favorites = vec![PathBuf::from("/b"), PathBuf::from("/a")];
        store.save_favorites(&favorites).unwrap();
        assert_eq!(store.load_favorites().unwrap(), favorites);
    }
}
