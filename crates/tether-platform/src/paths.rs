use std::fs;
use std::path::PathBuf;

use tether_common::PlatformError;

const APP_NAME: &str = "tether";

/// Returns the platform-specific configuration directory for Tether.
///
/// - macOS: `~/Library/Application Support/tether`
/// - Linux: `$XDG_CONFIG_HOME/tether` (defaults to `~/.config/tether`)
/// - Windows: `%APPDATA%\tether`
pub fn config_dir() -> Result<PathBuf, PlatformError> {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .ok_or_else(|| PlatformError::PathError("could not determine config directory".into()))
}

/// Returns the platform-specific data directory for Tether.
///
/// Session and favorites records live here.
pub fn data_dir() -> Result<PathBuf, PlatformError> {
    dirs::data_dir()
        .map(|p| p.join(APP_NAME))
        .ok_or_else(|| PlatformError::PathError("could not determine data directory".into()))
}

/// Directory holding the detachable PTY sockets, one per session.
///
/// Uses `$XDG_RUNTIME_DIR/tether` where the platform has one and falls back
/// to the system temp directory otherwise.
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

pub fn log_dir() -> Result<PathBuf, PlatformError> {
    Ok(data_dir()?.join("logs"))
}

pub fn crash_report_dir() -> Result<PathBuf, PlatformError> {
    Ok(log_dir()?.join("crash-reports"))
}

/// Creates all Tether directories if they do not already exist.
pub fn ensure_dirs() -> Result<(), std::io::Error> {
    let to_io = |e: PlatformError| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string());

    fs::create_dir_all(config_dir().map_err(to_io)?)?;
    fs::create_dir_all(data_dir().map_err(to_io)?)?;
    fs::create_dir_all(crash_report_dir().map_err(to_io)?)?;
    fs::create_dir_all(runtime_dir())?;
    Ok(())
}

/// The directory a new session starts in when the caller gives none:
/// the inherited working directory, else the home directory, else `/`.
pub fn default_working_directory() -> PathBuf {
    std::env::current_dir()
        .ok()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_ends_with_tether() {
        if let Ok(path) = config_dir() {
            assert!(path.ends_with("tether"), "got: {path:?}");
        }
    }

    #[test]
    fn crash_reports_live_under_logs() {
        if let (Ok(crash), Ok(logs)) = (crash_report_dir(), log_dir()) {
            assert!(crash.starts_with(&logs));
        }
    }

    #[test]
    fn runtime_dir_ends_with_tether() {
        assert!(runtime_dir().ends_with("tether"));
    }

    #[test]
    fn default_working_directory_is_absolute() {
        assert!(default_working_directory().is_absolute());
    }
}
