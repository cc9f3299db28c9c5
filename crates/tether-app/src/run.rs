//! `tether run`: attach one session to this terminal.
//!
//! Stdin lines are queued with `send_command`; a few `:`-prefixed lines are
//! local controls (see [`StdinLine`]). Block output is streamed to stdout
//! as it is classified, each block under a one-line header.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};

use tether_common::{BlockId, Event, SessionId, TetherError};
use tether_config::TetherConfig;
use tether_session::{
    launch_spec, BlockKind, ControlKey, SessionStatus, ShellHandle, ShellState, TerminalBlock,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::pty_bridge::{spawn_bridge, PtyBridge, DEFAULT_COLS, DEFAULT_ROWS};

/// A line typed on stdin, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinLine {
    Command(String),
    Control(ControlKey),
    /// Flush metadata as if for a hot reload.
    Reload,
    Detach,
}

impl StdinLine {
    pub fn parse(line: &str) -> Self {
        match line.trim_end_matches(['\r', '\n']) {
            ":int" => StdinLine::Control(ControlKey::Interrupt),
            ":eof" => StdinLine::Control(ControlKey::Eof),
            ":susp" => StdinLine::Control(ControlKey::Suspend),
            ":reload" => StdinLine::Reload,
            ":quit" | ":detach" => StdinLine::Detach,
            text => StdinLine::Command(text.to_string()),
        }
    }
}

/// New content of one block since the last time it was printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDelta {
    pub id: BlockId,
    pub kind: BlockKind,
    pub label: Option<String>,
    pub text: String,
    pub first: bool,
    pub complete: bool,
}

/// Tracks how much of each block has been printed.
///
/// Blocks before `watermark` are complete and fully printed, so only the
/// tail from the watermark on needs fetching. Offsets are kept for blocks
/// at or past the watermark only.
#[derive(Debug, Default)]
pub struct BlockPrinter {
    watermark: usize,
    printed: HashMap<BlockId, usize>,
    finished: HashSet<BlockId>,
}

impl BlockPrinter {
    /// Index of the first block that may still change.
    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// Deltas for `tail`, the session's blocks from [`Self::watermark`] on.
    pub fn deltas(&mut self, tail: &[TerminalBlock]) -> Vec<BlockDelta> {
        let mut deltas = Vec::new();
        for block in tail {
            if self.finished.contains(&block.id()) {
                continue;
            }
            let first = !self.printed.contains_key(&block.id());
            let offset = self.printed.entry(block.id()).or_insert(0);
            let text = block.content().get(*offset..).unwrap_or_default().to_string();
            *offset = block.content().len();
            if block.is_complete() {
                self.finished.insert(block.id());
            }
            if first || !text.is_empty() || block.is_complete() {
                deltas.push(BlockDelta {
                    id: block.id(),
                    kind: block.kind(),
                    label: block.label().map(str::to_string),
                    text,
                    first,
                    complete: block.is_complete(),
                });
            }
        }

        let done = tail.iter().take_while(|b| b.is_complete()).count();
        for block in &tail[..done] {
            self.printed.remove(&block.id());
            self.finished.remove(&block.id());
        }
        self.watermark += done;
        deltas
    }

    /// Forget everything; the next blocks start a fresh parse.
    pub fn reset(&mut self) {
        self.watermark = 0;
        self.printed.clear();
        self.finished.clear();
    }
}

pub fn render_delta(delta: &BlockDelta, out: &mut impl Write) -> std::io::Result<()> {
    if delta.first {
        match &delta.label {
            Some(label) => writeln!(out, "── {} #{} ({label})", delta.kind, delta.id)?,
            None => writeln!(out, "── {} #{}", delta.kind, delta.id)?,
        }
    }
    out.write_all(delta.text.as_bytes())?;
    if delta.complete && !delta.text.is_empty() && !delta.text.ends_with('\n') {
        writeln!(out)?;
    }
    out.flush()
}

/// Blocking entry point: builds a runtime, attaches, returns on detach or
/// when the session ends.
pub fn run(state: ShellState, config: &TetherConfig, target: Option<SessionId>) -> Result<(), TetherError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tether-shell")
        .build()?;
    runtime.block_on(attach(state, config.clone(), target))
}

async fn attach(mut state: ShellState, config: TetherConfig, target: Option<SessionId>) -> Result<(), TetherError> {
    let id = match target {
        Some(id) => id,
        None => state
            .active_id()
            .cloned()
            .ok_or_else(|| TetherError::Other("no session to attach".into()))?,
    };
    let session = state
        .session(&id)
        .cloned()
        .ok_or_else(|| TetherError::Other(format!("no session {id}")))?;
    if session.is_terminated() {
        return Err(TetherError::Other(format!(
            "session {id} is terminated; create a new one with `tether new`"
        )));
    }
    state.select_session(&id);

    let spec = launch_spec(
        &session,
        &config.shell,
        &config.sessions,
        &tether_platform::runtime_dir(),
    );
    let (handle, task) = ShellHandle::spawn(state);
    let mut events = handle.subscribe();

    let bridge = match spawn_bridge(&spec, id.clone(), handle.clone(), DEFAULT_COLS, DEFAULT_ROWS) {
        Ok(bridge) => bridge,
        Err(e) => {
            handle.shutdown().await?;
            let _ = task.await;
            return Err(e.into());
        }
    };
    {
        let id = id.clone();
        handle
            .call(move |s| s.set_session_status(&id, SessionStatus::Active))
            .await?;
    }

    let (detach_tx, mut detach_rx) = mpsc::unbounded_channel();
    spawn_stdin_reader(handle.clone(), id.clone(), detach_tx);

    let ended = pump(&handle, &id, bridge, &mut events, &mut detach_rx).await?;
    if !ended {
        let id = id.clone();
        handle
            .call(move |s| s.set_session_status(&id, SessionStatus::Idle))
            .await?;
    }

    let flushed = handle.shutdown().await?;
    let _ = task.await;
    info!(session = %id, ended, flushed, "Detached");
    Ok(())
}

/// Main loop. Returns `true` when the session ended, `false` on detach.
async fn pump(
    handle: &ShellHandle,
    id: &SessionId,
    mut bridge: PtyBridge,
    events: &mut broadcast::Receiver<Event>,
    detach_rx: &mut mpsc::UnboundedReceiver<()>,
) -> Result<bool, TetherError> {
    let mut printer = BlockPrinter::default();
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = detach_rx.recv() => {
                bridge.detach();
                return Ok(false);
            }
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "event stream lagged, resyncing");
                        print_blocks(handle, id, &mut printer, &mut stdout).await?;
                        deliver_pending(handle, id, &mut bridge).await?;
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(true),
                };
                match event {
                    Event::BlocksChanged { session, .. } if &session == id => {
                        print_blocks(handle, id, &mut printer, &mut stdout).await?;
                    }
                    Event::OutputCleared { session, .. } if &session == id => printer.reset(),
                    Event::CommandQueued { session, .. } | Event::ControlQueued { session, .. }
                        if &session == id =>
                    {
                        deliver_pending(handle, id, &mut bridge).await?;
                    }
                    Event::SessionClosed { session, .. } if &session == id => {
                        print_blocks(handle, id, &mut printer, &mut stdout).await?;
                        return Ok(true);
                    }
                    Event::Shutdown => return Ok(true),
                    _ => {}
                }
            }
        }
    }
}

async fn print_blocks(
    handle: &ShellHandle,
    id: &SessionId,
    printer: &mut BlockPrinter,
    out: &mut impl Write,
) -> Result<(), TetherError> {
    let tail = {
        let id = id.clone();
        let from = printer.watermark();
        handle
            .call(move |s| s.blocks(&id).get(from..).map(<[_]>::to_vec).unwrap_or_default())
            .await?
    };
    for delta in printer.deltas(&tail) {
        render_delta(&delta, out)?;
    }
    Ok(())
}

async fn deliver_pending(handle: &ShellHandle, id: &SessionId, bridge: &mut PtyBridge) -> Result<(), TetherError> {
    loop {
        let next = {
            let id = id.clone();
            handle.call(move |s| s.take_next_input(&id)).await?
        };
        let Some(input) = next else {
            return Ok(());
        };
        bridge.deliver(input)?;
    }
}

fn spawn_stdin_reader(handle: ShellHandle, id: SessionId, detach_tx: mpsc::UnboundedSender<()>) {
    let spawned = std::thread::Builder::new()
        .name("tether-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let id = id.clone();
                let result = match StdinLine::parse(&line) {
                    StdinLine::Detach => break,
                    StdinLine::Command(text) => {
                        handle.call_blocking(move |s| s.send_command(&id, &text))
                    }
                    StdinLine::Control(key) => {
                        handle.call_blocking(move |s| s.send_control_character(&id, key.byte()))
                    }
                    StdinLine::Reload => handle.call_blocking(|s| {
                        let ok = s.prepare_for_reload();
                        s.restore_after_reload();
                        ok
                    }),
                };
                if result.is_err() {
                    return;
                }
            }
            let _ = detach_tx.send(());
        });
    if let Err(e) = spawned {
        warn!("Failed to start stdin reader: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_session::BlockParser;

    #[test]
    fn stdin_controls() {
        assert_eq!(StdinLine::parse(":int"), StdinLine::Control(ControlKey::Interrupt));
        assert_eq!(StdinLine::parse(":eof\n"), StdinLine::Control(ControlKey::Eof));
        assert_eq!(StdinLine::parse(":quit"), StdinLine::Detach);
        assert_eq!(StdinLine::parse(":reload"), StdinLine::Reload);
        assert_eq!(StdinLine::parse("ls -la\r\n"), StdinLine::Command("ls -la".into()));
    }

    #[test]
    fn printer_streams_each_byte_once() {
        let mut parser = BlockParser::default();
        let mut printer = BlockPrinter::default();

        parser.feed(b"\x1b]133;C\x07hel");
        let first = printer.deltas(&parser.blocks()[printer.watermark()..]);
        assert_eq!(first.len(), 1);
        assert!(first[0].first);
        assert_eq!(first[0].text, "hel");

        parser.feed(b"lo\x1b]133;D;1\x07");
        let second = printer.deltas(&parser.blocks()[printer.watermark()..]);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].text, "lo");
        assert!(!second[0].first && second[0].complete);
        assert_eq!(second[1].kind, BlockKind::Error);
        assert_eq!(second[1].label.as_deref(), Some("exit 1"));

        assert_eq!(printer.watermark(), 2);
        assert!(printer.deltas(&parser.blocks()[printer.watermark()..]).is_empty());
    }

    #[test]
    fn printer_only_tracks_unfinished_tail() {
        let mut parser = BlockParser::default();
        let mut printer = BlockPrinter::default();

        for n in 0..50 {
            parser.feed(format!("\x1b]7733;system\x07line {n}\x1b]7733;end\x07").as_bytes());
            printer.deltas(&parser.blocks()[printer.watermark()..]);
        }
        assert_eq!(printer.watermark(), 50);
        assert!(printer.printed.is_empty() && printer.finished.is_empty());

        parser.feed(b"\x1b]133;C\x07run");
        let deltas = printer.deltas(&parser.blocks()[printer.watermark()..]);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].text, "run");
        assert_eq!(printer.watermark(), 50);
        assert_eq!(printer.printed.len(), 1);

        printer.reset();
        parser.reset();
        assert_eq!(printer.watermark(), 0);
    }

    #[test]
    fn render_adds_header_and_newline() {
        let delta = BlockDelta {
            id: BlockId(3),
            kind: BlockKind::ToolCall,
            label: Some("Read".into()),
            text: "src/main.rs".into(),
            first: true,
            complete: true,
        };
        let mut out = Vec::new();
        render_delta(&delta, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "── tool-call #3 (Read)\nsrc/main.rs\n"
        );
    }
}
