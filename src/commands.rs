//! Operator command parsing for the review channel.
//!
//! Grammar (case-insensitive, surrounding whitespace ignored):
//! - `reject all [reason]`
//! - `approve <id>`
//! - `revise <id> <new text>`
//! - `reject <id> <reason>`
//!
//! `reject all` is matched before `reject <id>` so "all" is never taken as an id.

use std::sync::LazyLock;

use regex::Regex;

use crate::drafts::DEFAULT_BULK_REASON;

static REJECT_ALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^reject\s+all(?:\s+(.+))?$").unwrap());
static APPROVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^approve\s+(\S+)\s*$").unwrap());
static REVISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^revise\s+(\S+)\s+(.+)$").unwrap());
static REJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^reject\s+(\S+)\s+(.+)$").unwrap());

/// A recognized operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Approve { draft_id: String },
    Revise { draft_id: String, new_text: String },
    Reject { draft_id: String, reason: String },
    RejectAll { reason: String },
}

/// Parse a chat message into a command. Unrecognized text yields `None`.
pub fn parse_command(message: &str) -> Option<Command> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = REJECT_ALL.captures(trimmed) {
        let reason = caps
            .get(1)
            .map(|m| m.as_str().trim())
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_BULK_REASON);
        return Some(Command::RejectAll {
            reason: reason.to_string(),
        });
    }

    if let Some(caps) = APPROVE.captures(trimmed) {
        return Some(Command::Approve {
            draft_id: caps[1].to_string(),
        });
    }

    if let Some(caps) = REVISE.captures(trimmed) {
        return Some(Command::Revise {
            draft_id: caps[1].to_string(),
            new_text: caps[2].trim().to_string(),
        });
    }

    if let Some(caps) = REJECT.captures(trimmed) {
        return Some(Command::Reject {
            draft_id: caps[1].to_string(),
            reason: caps[2].trim().to_string(),
        });
    }

    None
}
