//! PTY addressing: how a session id maps to a detachable socket, and what
//! process a session runs.
//!
//! Each session gets its own multiplexer socket named after its id. A
//! session that outlived the application is found again by id: launching
//! it with `new-session -A` attaches when the socket's session still exists
//! and creates it otherwise.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tether_common::SessionId;
use tether_config::schema::{SessionsConfig, ShellConfig};

use crate::session::Session;

/// Prefix of every session socket name.
pub const SOCKET_PREFIX: &str = "tether";

// =============================================================================
// ADDRESSING
// =============================================================================

/// `tether-<id>`: the socket and multiplexer session name for `id`.
pub fn socket_name(id: &SessionId) -> String {
    format!("{SOCKET_PREFIX}-{id}")
}

pub fn socket_path(runtime_dir: &Path, id: &SessionId) -> PathBuf {
    runtime_dir.join(socket_name(id))
}

// =============================================================================
// SHELL
// =============================================================================

/// The user's shell: `$SHELL` on Unix (else `/bin/sh`), `$COMSPEC` on
/// Windows (else `cmd.exe`).
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }
}

/// Variables inherited from the parent environment. Everything else is
/// dropped so application secrets do not leak into sessions.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "HOME",
    "USER",
    "LOGNAME",
    "SHELL",
    "PATH",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "DISPLAY",
    "WAYLAND_DISPLAY",
    "XDG_RUNTIME_DIR",
    "TMPDIR",
    "USERPROFILE",
    "APPDATA",
    "LOCALAPPDATA",
    "SYSTEMROOT",
    "COMSPEC",
];

// =============================================================================
// LAUNCH SPEC
// =============================================================================

/// Everything needed to start (or reattach) a session's process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Full environment; the parent's is not inherited beyond this.
    pub env: BTreeMap<String, String>,
}

/// Builds the launch spec for `session`.
///
/// With `sessions.detach` the shell runs inside
/// `<tmux> -S <socket> new-session -A -s <name> -c <cwd> <shell...>`;
/// otherwise the shell runs directly in the PTY.
pub fn launch_spec(
    session: &Session,
    shell: &ShellConfig,
    sessions: &SessionsConfig,
    runtime_dir: &Path,
) -> LaunchSpec {
    let program = if shell.program.trim().is_empty() {
        default_shell()
    } else {
        shell.program.clone()
    };
    let mut shell_argv = vec![program];
    if shell.login_shell && cfg!(unix) {
        shell_argv.push("-l".into());
    }
    shell_argv.extend(shell.args.iter().cloned());

    let cwd = session.working_directory().to_path_buf();
    let env = launch_env(session, shell);

    if sessions.detach {
        let name = socket_name(session.id());
        let mut args = vec![
            "-S".to_string(),
            socket_path(runtime_dir, session.id()).display().to_string(),
            "new-session".into(),
            "-A".into(),
            "-s".into(),
            name,
            "-c".into(),
            cwd.display().to_string(),
        ];
        args.extend(shell_argv);
        LaunchSpec {
            program: sessions.tmux_program.clone(),
            args,
            cwd,
            env,
        }
    } else {
        let mut argv = shell_argv.into_iter();
        LaunchSpec {
            program: argv.next().unwrap_or_else(default_shell),
            args: argv.collect(),
            cwd,
            env,
        }
    }
}

fn launch_env(session: &Session, shell: &ShellConfig) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = ALLOWED_ENV_VARS
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
        .collect();
    env.insert("TERM".into(), "xterm-256color".into());
    env.insert("TETHER_SESSION_ID".into(), session.id().to_string());
    for (key, value) in &shell.env {
        env.insert(key.clone(), value.clone());
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn shell(program: &str, login: bool) -> ShellConfig {
        ShellConfig {
            program: program.into(),
            args: vec!["--norc".into()],
            env: HashMap::from([("EDITOR".to_string(), "vi".to_string())]),
            login_shell: login,
        }
    }

    #[test]
    fn socket_is_keyed_by_session_id() {
        let id = SessionId::from("abc");
        assert_eq!(socket_name(&id), "tether-abc");
        assert_eq!(
            socket_path(Path::new("/run/user/1000/tether"), &id),
            PathBuf::from("/run/user/1000/tether/tether-abc")
        );
    }

    #[test]
    fn detached_launch_attaches_or_creates_by_id() {
        let session = Session::new("s", "/work");
        let spec = launch_spec(
            &session,
            &shell("/bin/bash", false),
            &SessionsConfig::default(),
            Path::new("/run/tether"),
        );
        let name = socket_name(session.id());
        let socket = format!("/run/tether/{name}");

        assert_eq!(spec.program, "tmux");
        assert_eq!(
            spec.args,
            vec![
                "-S",
                socket.as_str(),
                "new-session",
                "-A",
                "-s",
                name.as_str(),
                "-c",
                "/work",
                "/bin/bash",
                "--norc",
            ]
        );
        assert_eq!(spec.cwd, PathBuf::from("/work"));
    }

    #[test]
    fn plain_launch_runs_shell_directly() {
        let session = Session::new("s", "/work");
        let sessions = SessionsConfig {
            detach: false,
            ..SessionsConfig::default()
        };
        let spec = launch_spec(&session, &shell("/bin/zsh", true), &sessions, Path::new("/run"));

        assert_eq!(spec.program, "/bin/zsh");
        #[cfg(unix)]
        assert_eq!(spec.args, vec!["-l", "--norc"]);
    }

    #[test]
    fn env_is_sanitized_and_tagged() {
        let session = Session::new("s", "/work");
        let spec = launch_spec(
            &session,
            &shell("/bin/sh", false),
            &SessionsConfig::default(),
            Path::new("/run"),
        );
        assert_eq!(spec.env.get("TERM").map(String::as_str), Some("xterm-256color"));
        assert_eq!(spec.env.get("EDITOR").map(String::as_str), Some("vi"));
        assert_eq!(
            spec.env.get("TETHER_SESSION_ID").map(String::as_str),
            Some(session.id().as_str())
        );
        assert!(spec
            .env
            .keys()
            .all(|k| ALLOWED_ENV_VARS.contains(&k.as_str())
                || ["TERM", "EDITOR", "TETHER_SESSION_ID"].contains(&k.as_str())));
    }

    #[test]
    fn empty_program_falls_back_to_default_shell() {
        let session = Session::new("s", "/");
        let sessions = SessionsConfig {
            detach: false,
            ..SessionsConfig::default()
        };
        let spec = launch_spec(&session, &ShellConfig::default(), &sessions, Path::new("/run"));
        assert_eq!(spec.program, default_shell());
    }
}
