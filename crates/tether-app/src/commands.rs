//! One-shot subcommands: operate on the loaded state, print, exit.

use std::io::Write;

use tether_common::{SessionId, TetherError};
use tether_config::TetherConfig;
use tether_session::{Session, ShellState};

use crate::cli::{Command, FavoriteAction};

/// Finds a session by full id or unique id prefix.
pub fn resolve_session(state: &ShellState, query: &str) -> Result<SessionId, TetherError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(TetherError::Other("empty session id".into()));
    }
    if let Some(exact) = state.sessions().iter().find(|s| s.id().as_str() == query) {
        return Ok(exact.id().clone());
    }
    let matches: Vec<&Session> = state
        .sessions()
        .iter()
        .filter(|s| s.id().as_str().starts_with(query))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id().clone()),
        [] => Err(TetherError::Other(format!("no session matches '{query}'"))),
        _ => Err(TetherError::Other(format!(
            "'{query}' matches {} sessions, use a longer prefix",
            matches.len()
        ))),
    }
}

pub fn execute(
    command: Command,
    state: &mut ShellState,
    config: &TetherConfig,
    out: &mut impl Write,
) -> Result<(), TetherError> {
    match command {
        Command::List { json } => list(state, json, out)?,
        Command::New { name, directory } => {
            let session = state.create_session(name, directory);
            writeln!(out, "{}", session.id())?;
        }
        Command::Close { id } => {
            let id = resolve_session(state, &id)?;
            state.close_session(&id);
        }
        Command::Rename { id, name } => {
            let id = resolve_session(state, &id)?;
            if !state.rename_session(&id, name) {
                return Err(TetherError::Other("name must not be empty".into()));
            }
        }
        Command::Delete { id } => {
            let id = resolve_session(state, &id)?;
            state.delete_session(&id);
        }
        Command::Favorites { action } => {
            match action {
                Some(FavoriteAction::Add { path }) => {
                    state.add_favorite(path);
                }
                Some(FavoriteAction::Remove { path }) => {
                    state.remove_favorite(&path);
                }
                None => {}
            }
            for path in state.favorites() {
                writeln!(out, "{}", path.display())?;
            }
        }
        Command::Config => writeln!(out, "{}", tether_config::config_to_json(config))?,
        Command::Run { .. } => {
            return Err(TetherError::Other("run needs a terminal bridge".into()));
        }
    }
    Ok(())
}

fn list(state: &ShellState, json: bool, out: &mut impl Write) -> Result<(), TetherError> {
    if json {
        let text = serde_json::to_string_pretty(state.sessions())
            .map_err(|e| TetherError::Other(e.to_string()))?;
        writeln!(out, "{text}")?;
        return Ok(());
    }
    let active = state.active_id();
    for session in state.sessions() {
        let marker = if Some(session.id()) == active { '*' } else { ' ' };
        writeln!(
            out,
            "{marker} {}  {:<10}  {:<16}  {}  {}",
            session.id(),
            format!("{:?}", session.status()).to_lowercase(),
            session.name(),
            session.created_at().format("%Y-%m-%d %H:%M"),
            session.working_directory().display(),
        )?;
    }
    Ok(())
}
