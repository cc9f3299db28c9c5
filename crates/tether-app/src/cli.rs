use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tether: persistent terminal sessions with structured output.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive override (e.g. `debug`,
    /// `tether_session=trace`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Directory holding sessions.json and favorites.json.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List sessions (`*` marks the active one).
    List {
        /// Print the stored records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create a session.
    New {
        name: Option<String>,
        /// Working directory (defaults to the current one).
        #[arg(short = 'd', long)]
        directory: Option<PathBuf>,
    },
    /// Mark a session terminated. Its detached process keeps running.
    Close { id: String },
    Rename { id: String, name: String },
    /// Purge a session from history.
    Delete { id: String },
    /// List, add, or remove favorite directories.
    Favorites {
        #[command(subcommand)]
        action: Option<FavoriteAction>,
    },
    /// Print the effective configuration as JSON.
    Config,
    /// Attach a session to this terminal (the active one by default).
    Run { id: Option<String> },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum FavoriteAction {
    Add { path: PathBuf },
    Remove { path: PathBuf },
}

pub fn parse() -> Args {
    Args::parse()
}
