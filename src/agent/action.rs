//! Parsing AI replies into proposed actions
//!
//! A reply carries exactly one action block:
//!
//! ````text
//! ```gdb-command
//! info locals
//! ```
//! ````
//!
//! or a ```` ```complete ```` block with the final conclusion. Optional
//! ```` ```analysis ```` and ```` ```next-step ```` blocks are kept as notes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The single action an AI reply asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProposedAction {
    /// Run one debugger command
    Command { text: String },
    /// Finish the investigation
    Conclude { summary: String },
    /// The reply could not be understood
    Malformed { raw: String },
}

impl fmt::Display for ProposedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposedAction::Command { text } => write!(f, "command `{}`", text),
            ProposedAction::Conclude { .. } => write!(f, "conclude"),
            ProposedAction::Malformed { .. } => write!(f, "malformed reply"),
        }
    }
}

/// A parsed reply: the action plus any free-form notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub action: ProposedAction,
    pub analysis: Option<String>,
    pub next_step: Option<String>,
}

const COMMAND_TAGS: &[&str] = &["gdb-command", "gdb"];
const CONCLUDE_TAG: &str = "complete";

/// Fenced blocks as (tag, body) pairs; unterminated blocks are dropped
fn fenced_blocks(reply: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut open: Option<(String, String)> = None;

    for line in reply.lines() {
        match open.take() {
            None => {
                if let Some(tag) = line.trim().strip_prefix("```") {
                    let tag = tag.trim();
                    if !tag.is_empty() && !tag.contains("```") {
                        open = Some((tag.to_lowercase(), String::new()));
                    }
                }
            }
            Some((tag, mut body)) => {
                if let Some(end) = line.find("```") {
                    body.push_str(&line[..end]);
                    blocks.push((tag, body));
                } else {
                    body.push_str(line);
                    body.push('\n');
                    open = Some((tag, body));
                }
            }
        }
    }
    blocks
}

/// Parse a reply. Anything other than exactly one action becomes `Malformed`.
pub fn parse_reply(reply: &str) -> ParsedReply {
    let blocks = fenced_blocks(reply);
    let note = |wanted: &str| {
        blocks
            .iter()
            .find(|(tag, _)| tag == wanted)
            .map(|(_, body)| body.trim().to_string())
            .filter(|body| !body.is_empty())
    };

    let commands: Vec<&str> = blocks
        .iter()
        .filter(|(tag, _)| COMMAND_TAGS.contains(&tag.as_str()))
        .map(|(_, body)| body.as_str())
        .collect();
    let conclusions: Vec<&str> = blocks
        .iter()
        .filter(|(tag, _)| tag == CONCLUDE_TAG)
        .map(|(_, body)| body.trim())
        .collect();

    let malformed = || ProposedAction::Malformed {
        raw: reply.to_string(),
    };

    let action = match (commands.as_slice(), conclusions.as_slice()) {
        ([body], []) => {
            let lines: Vec<&str> = body
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            match lines.as_slice() {
                [command] => ProposedAction::Command {
                    text: command.to_string(),
                },
                _ => malformed(),
            }
        }
        ([], [summary]) if !summary.is_empty() => ProposedAction::Conclude {
            summary: summary.to_string(),
        },
        _ => malformed(),
    };

    ParsedReply {
        action,
        analysis: note("analysis"),
        next_step: note("next-step"),
    }
}
