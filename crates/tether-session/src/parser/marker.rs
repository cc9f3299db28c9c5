//! Marker grammar: which OSC bodies classify the stream.
//!
//! | body                       | marker                     |
//! |----------------------------|----------------------------|
//! | `133;A`, `133;B`           | prompt / command start     |
//! | `133;C`                    | command executed           |
//! | `133;D[;<exit code>]`      | command finished           |
//! | `7733;<kind>[;<label>]`    | open a block of `<kind>`   |
//! | `7733;end`                 | complete the open block    |
//! | `7;file://<host><path>`    | working directory changed  |
//!
//! Everything else is not a marker and stays literal output.

use std::path::PathBuf;

use crate::block::BlockKind;

/// OSC code of the shell-integration (semantic prompt) sequences.
pub const SHELL_INTEGRATION_OSC: &str = "133";

/// OSC code for explicit block markers emitted by agents and tools.
pub const BLOCK_OSC: &str = "7733";

/// OSC code of the working-directory report.
pub const CWD_OSC: &str = "7";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Marker {
    PromptStart,
    CommandStart,
    CommandExecuted,
    CommandFinished(Option<i32>),
    Open {
        kind: BlockKind,
        label: Option<String>,
    },
    End,
    WorkingDirectory(PathBuf),
}

/// Classifies the body of a complete OSC sequence (between `ESC ]` and the
/// terminator). `None` means "not a marker".
pub(crate) fn classify(body: &str) -> Option<Marker> {
    let (code, rest) = body.split_once(';')?;
    match code {
        SHELL_INTEGRATION_OSC => classify_shell_integration(rest),
        BLOCK_OSC => classify_block(rest),
        CWD_OSC => parse_file_url(rest).map(Marker::WorkingDirectory),
        _ => None,
    }
}

fn classify_shell_integration(rest: &str) -> Option<Marker> {
    let mut parts = rest.split(';');
    match parts.next()? {
        "A" => Some(Marker::PromptStart),
        "B" => Some(Marker::CommandStart),
        "C" => Some(Marker::CommandExecuted),
        "D" => {
            let code = parts.next().and_then(|c| c.trim().parse::<i32>().ok());
            Some(Marker::CommandFinished(code))
        }
        _ => None,
    }
}

fn classify_block(rest: &str) -> Option<Marker> {
    let (head, label) = match rest.split_once(';') {
        Some((head, label)) => (head, Some(label)),
        None => (rest, None),
    };
    if head == "end" {
        return Some(Marker::End);
    }
    let kind = head.parse::<BlockKind>().ok()?;
    let label = label.filter(|l| !l.is_empty()).map(str::to_string);
    Some(Marker::Open { kind, label })
}

/// `file://host/some%20dir` -> `/some dir`. The host part is ignored, and
/// a `%` that does not start a valid escape is kept as is.
fn parse_file_url(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("file://")?;
    let path = &rest[rest.find('/')?..];
    let decoded = urlencoding::decode_binary(path.as_bytes());
    String::from_utf8(decoded.into_owned()).ok().map(PathBuf::from)
}
