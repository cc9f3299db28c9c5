//! Typed units of terminal activity derived from raw output.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tether_common::BlockId;

/// What a block represents. Fixed when the block is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Command,
    Output,
    ToolCall,
    AgentResponse,
    Error,
    System,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Command => "command",
            BlockKind::Output => "output",
            BlockKind::ToolCall => "tool-call",
            BlockKind::AgentResponse => "agent-response",
            BlockKind::Error => "error",
            BlockKind::System => "system",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command" => Ok(BlockKind::Command),
            "output" => Ok(BlockKind::Output),
            "tool-call" => Ok(BlockKind::ToolCall),
            "agent-response" => Ok(BlockKind::AgentResponse),
            "error" => Ok(BlockKind::Error),
            "system" => Ok(BlockKind::System),
            _ => Err(()),
        }
    }
}

/// A classified block of one session's output.
///
/// Only the parser mutates blocks, and only while `is_complete` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalBlock {
    id: BlockId,
    kind: BlockKind,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    created_at: DateTime<Utc>,
    is_complete: bool,
}

impl TerminalBlock {
    pub(crate) fn open(id: BlockId, kind: BlockKind, label: Option<String>) -> Self {
        Self {
            id,
            kind,
            content: String::new(),
            label,
            created_at: Utc::now(),
            is_complete: false,
        }
    }

    /// Appends streamed content. Returns `false` (and changes nothing) once
    /// the block is complete.
    pub(crate) fn push_str(&mut self, text: &str) -> bool {
        if self.is_complete {
            return false;
        }
        self.content.push_str(text);
        true
    }

    pub(crate) fn complete(&mut self) {
        self.is_complete = true;
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }
}
