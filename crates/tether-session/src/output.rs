//! Per-session raw output buffer with its block parser.

use crate::block::TerminalBlock;
use crate::parser::{BlockParser, ParseEvent};

/// Raw bytes plus the blocks derived from them. The two are only ever
/// cleared together.
#[derive(Debug)]
pub struct SessionOutput {
    raw: Vec<u8>,
    parser: BlockParser,
}

impl Default for SessionOutput {
    fn default() -> Self {
        Self::new(crate::parser::DEFAULT_MAX_MARKER_LEN)
    }
}

impl SessionOutput {
    pub fn new(max_marker_len: usize) -> Self {
        Self {
            raw: Vec::new(),
            parser: BlockParser::new(max_marker_len),
        }
    }

    /// Appends in arrival order and parses incrementally.
    pub fn append(&mut self, bytes: &[u8]) -> Vec<ParseEvent> {
        self.raw.extend_from_slice(bytes);
        self.parser.feed(bytes)
    }

    pub fn flush(&mut self) -> Vec<ParseEvent> {
        self.parser.flush()
    }

    pub fn clear(&mut self) {
        self.raw.clear();
        self.parser.reset();
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn blocks(&self) -> &[TerminalBlock] {
        self.parser.blocks()
    }

    pub fn open_block(&self) -> Option<&TerminalBlock> {
        self.parser.open_block()
    }
}
