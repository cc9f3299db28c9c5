//! Incremental block parser.
//!
//! Turns a session's raw byte stream into an ordered list of
//! [`TerminalBlock`]s as bytes arrive. Classification is driven only by the
//! OSC markers in [`marker`]; every other byte (CSI, other OSCs, C0 controls)
//! is literal content of the open block. Control codes are never stripped:
//! rendering them is the terminal engine's job.
//!
//! At most one block is open at a time. Opening a block completes the
//! previous one, and text that arrives with no open block starts an
//! implicit `output` block, so the parser accepts any input.

pub mod marker;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use tether_common::BlockId;
use tracing::trace;

use crate::block::{BlockKind, TerminalBlock};
use marker::Marker;

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Default bound on a buffered, unterminated OSC sequence.
pub const DEFAULT_MAX_MARKER_LEN: usize = 1024;

/// What a [`BlockParser::feed`] call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    BlockOpened(BlockId),
    BlockUpdated(BlockId),
    BlockCompleted(BlockId),
    /// An OSC 7 working-directory report was seen.
    WorkingDirectory(PathBuf),
}

impl ParseEvent {
    pub fn block_id(&self) -> Option<BlockId> {
        match self {
            ParseEvent::BlockOpened(id)
            | ParseEvent::BlockUpdated(id)
            | ParseEvent::BlockCompleted(id) => Some(*id),
            ParseEvent::WorkingDirectory(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Ground,
    /// Saw `ESC`.
    Escape,
    /// Inside `ESC ]`, collecting the body.
    Osc,
    /// Saw `ESC` inside an OSC; `\` would terminate it.
    OscEscape,
}

#[derive(Debug)]
pub struct BlockParser {
    blocks: Vec<TerminalBlock>,
    /// Index into `blocks` of the open block.
    open: Option<usize>,
    state: ScanState,
    /// Bytes of an escape sequence that is not yet classified.
    sequence: Vec<u8>,
    /// Tail of a UTF-8 character split across two feeds.
    utf8_carry: Vec<u8>,
    next_id: u64,
    max_marker_len: usize,
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MARKER_LEN)
    }
}

impl BlockParser {
    pub fn new(max_marker_len: usize) -> Self {
        Self {
            blocks: Vec::new(),
            open: None,
            state: ScanState::Ground,
            sequence: Vec::new(),
            utf8_carry: Vec::new(),
            next_id: 1,
            max_marker_len: max_marker_len.max(4),
        }
    }

    pub fn blocks(&self) -> &[TerminalBlock] {
        &self.blocks
    }

    pub fn open_block(&self) -> Option<&TerminalBlock> {
        self.open.map(|idx| &self.blocks[idx])
    }

    /// Parses the next chunk of the stream.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ParseEvent> {
        let mut events = Vec::new();
        let mut text = Vec::new();
        for &byte in bytes {
            self.step(byte, &mut text, &mut events);
        }
        self.emit_text(&mut text, &mut events);
        events
    }

    /// End of stream: buffered partial sequences become literal content and
    /// the open block is completed.
    pub fn flush(&mut self) -> Vec<ParseEvent> {
        let mut events = Vec::new();
        let mut text = std::mem::take(&mut self.sequence);
        self.state = ScanState::Ground;
        self.emit_text(&mut text, &mut events);
        self.flush_carry(&mut events);
        self.complete_open(&mut events);
        events
    }

    /// Drops all blocks and scan state. Block ids keep counting up so an id
    /// is never reused within a session.
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.open = None;
        self.state = ScanState::Ground;
        self.sequence.clear();
        self.utf8_carry.clear();
    }

    fn step(&mut self, byte: u8, text: &mut Vec<u8>, events: &mut Vec<ParseEvent>) {
        match self.state {
            ScanState::Ground => {
                if byte == ESC {
                    self.sequence.push(byte);
                    self.state = ScanState::Escape;
                } else {
                    text.push(byte);
                }
            }
            ScanState::Escape => {
                if byte == b']' {
                    self.sequence.push(byte);
                    self.state = ScanState::Osc;
                } else {
                    // Not an OSC: the ESC is literal, re-scan this byte.
                    text.append(&mut self.sequence);
                    self.state = ScanState::Ground;
                    self.step(byte, text, events);
                }
            }
            ScanState::Osc => {
                self.sequence.push(byte);
                match byte {
                    BEL => self.finish_osc(1, text, events),
                    ESC => self.state = ScanState::OscEscape,
                    _ if self.sequence.len() > self.max_marker_len => {
                        text.append(&mut self.sequence);
                        self.state = ScanState::Ground;
                    }
                    _ => {}
                }
            }
            ScanState::OscEscape => {
                if byte == b'\\' {
                    self.sequence.push(byte);
                    self.finish_osc(2, text, events);
                } else {
                    // Malformed OSC. Everything before the new ESC is literal.
                    self.sequence.pop();
                    text.append(&mut self.sequence);
                    self.sequence.push(ESC);
                    self.state = ScanState::Escape;
                    self.step(byte, text, events);
                }
            }
        }
    }

    /// `terminator_len` is 1 for BEL, 2 for `ESC \`.
    fn finish_osc(&mut self, terminator_len: usize, text: &mut Vec<u8>, events: &mut Vec<ParseEvent>) {
        self.state = ScanState::Ground;
        let sequence = std::mem::take(&mut self.sequence);
        let body = &sequence[2..sequence.len() - terminator_len];
        let marker = std::str::from_utf8(body).ok().and_then(marker::classify);

        match marker {
            None => text.extend_from_slice(&sequence),
            Some(Marker::WorkingDirectory(path)) => {
                text.extend_from_slice(&sequence);
                events.push(ParseEvent::WorkingDirectory(path));
            }
            Some(marker) => {
                trace!(?marker, "block marker");
                self.emit_text(text, events);
                self.flush_carry(events);
                self.apply(marker, events);
            }
        }
    }

    fn apply(&mut self, marker: Marker, events: &mut Vec<ParseEvent>) {
        match marker {
            Marker::PromptStart | Marker::CommandStart => {
                if self.open_block().map(TerminalBlock::kind) != Some(BlockKind::Command) {
                    self.open_new(BlockKind::Command, None, events);
                }
            }
            Marker::CommandExecuted => self.open_new(BlockKind::Output, None, events),
            Marker::CommandFinished(code) => {
                self.complete_open(events);
                if let Some(code) = code.filter(|c| *c != 0) {
                    self.open_new(BlockKind::Error, Some(format!("exit {code}")), events);
                    self.append_str(&format!("command exited with status {code}"), events);
                    self.complete_open(events);
                }
            }
            Marker::Open { kind, label } => self.open_new(kind, label, events),
            Marker::End => self.complete_open(events),
            Marker::WorkingDirectory(_) => {}
        }
    }

    fn open_new(&mut self, kind: BlockKind, label: Option<String>, events: &mut Vec<ParseEvent>) {
        self.complete_open(events);
        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.blocks.push(TerminalBlock::open(id, kind, label));
        self.open = Some(self.blocks.len() - 1);
        events.push(ParseEvent::BlockOpened(id));
    }

    fn complete_open(&mut self, events: &mut Vec<ParseEvent>) {
        if let Some(idx) = self.open.take() {
            let block = &mut self.blocks[idx];
            block.complete();
            events.push(ParseEvent::BlockCompleted(block.id()));
        }
    }

    /// Decodes buffered literal bytes into the open block, holding back an
    /// incomplete trailing UTF-8 sequence for the next feed.
    fn emit_text(&mut self, text: &mut Vec<u8>, events: &mut Vec<ParseEvent>) {
        if text.is_empty() {
            return;
        }
        let mut bytes = std::mem::take(&mut self.utf8_carry);
        bytes.append(text);
        let (decoded, carry) = decode_utf8_streaming(&bytes);
        self.utf8_carry = carry;
        self.append_str(&decoded, events);
    }

    fn flush_carry(&mut self, events: &mut Vec<ParseEvent>) {
        if self.utf8_carry.is_empty() {
            return;
        }
        let carry = std::mem::take(&mut self.utf8_carry);
        self.append_str(&String::from_utf8_lossy(&carry), events);
    }

    fn append_str(&mut self, s: &str, events: &mut Vec<ParseEvent>) {
        if s.is_empty() {
            return;
        }
        let idx = match self.open {
            Some(idx) => idx,
            None => {
                self.open_new(BlockKind::Output, None, events);
                self.blocks.len() - 1
            }
        };
        let block = &mut self.blocks[idx];
        block.push_str(s);
        let id = block.id();
        let already_reported = matches!(
            events.last(),
            Some(ParseEvent::BlockOpened(last) | ParseEvent::BlockUpdated(last)) if *last == id
        );
        if !already_reported {
            events.push(ParseEvent::BlockUpdated(id));
        }
    }
}

/// Lossy UTF-8 decode that returns an incomplete trailing sequence instead
/// of replacing it.
fn decode_utf8_streaming(bytes: &[u8]) -> (String, Vec<u8>) {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                out.push_str(s);
                return (out, Vec::new());
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    None => return (out, after.to_vec()),
                }
            }
        }
    }
}
