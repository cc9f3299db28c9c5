mod cli;
mod commands;
mod pty_bridge;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use tether_common::TetherError;
use tether_config::TetherConfig;
use tether_session::{SessionStore, ShellOptions, ShellState};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let path = tether_platform::crash_report::write_crash_report(info);

        eprintln!("\n--- Tether crashed ---");
        if let Some(p) = &path {
            eprintln!("Crash report written to: {}", p.display());
        }
        eprintln!("----------------------\n");

        default_hook(info);
    }));
}

/// `--log-level` wins over `[logging] level`. A bare level applies to the
/// tether crates; anything with `=` is used as a filter directive as is.
fn log_directive(cli_level: Option<&str>, config: &TetherConfig) -> String {
    match cli_level {
        Some(level) if level.contains('=') => level.to_string(),
        Some(level) => format!("tether={level}"),
        None => format!("tether={}", config.logging.level.as_directive()),
    }
}

fn init_logging(directive: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap_or_else(|_| LevelFilter::INFO.into())),
        )
        .init();
}

fn load_config(args: &Args) -> TetherConfig {
    let loaded = match &args.config {
        Some(path) => tether_config::load_config_from(path),
        None => tether_config::load_config(),
    };
    // Logging is not up yet.
    loaded.unwrap_or_else(|e| {
        eprintln!("tether: config load failed, using defaults: {e}");
        TetherConfig::default()
    })
}

fn open_store(args: &Args, config: &TetherConfig) -> Result<SessionStore, TetherError> {
    if let Some(dir) = &args.data_dir {
        return Ok(SessionStore::new(dir));
    }
    if let Some(dir) = &config.storage.data_dir {
        return Ok(SessionStore::new(PathBuf::from(dir)));
    }
    Ok(SessionStore::at_default_location()?)
}

fn real_main(args: Args) -> Result<(), TetherError> {
    let config = load_config(&args);
    init_logging(&log_directive(args.log_level.as_deref(), &config));
    tracing::info!("Tether v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Using config override");
    }

    if let Err(e) = tether_platform::ensure_dirs() {
        tracing::warn!("Failed to create directories: {e}");
    }

    let store = open_store(&args, &config)?;
    tracing::debug!(dir = %store.dir().display(), "Session store");
    let mut state = ShellState::new(store, ShellOptions::from_config(&config));
    let outcome = state.load_from_disk();
    tracing::debug!(?outcome, "State loaded");

    match args.command {
        None => run::run(state, &config, None),
        Some(Command::Run { id }) => {
            let target = id
                .map(|id| commands::resolve_session(&state, &id))
                .transpose()?;
            run::run(state, &config, target)
        }
        Some(command) => {
            let mut stdout = std::io::stdout().lock();
            let result = commands::execute(command, &mut state, &config, &mut stdout);
            state.shutdown();
            result
        }
    }
}

fn main() -> ExitCode {
    install_panic_hook();
    let args = cli::parse();

    match real_main(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("tether: {e}");
            ExitCode::FAILURE
        }
    }
}
