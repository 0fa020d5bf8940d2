//! Draft data model — summaries awaiting a human decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::story_key;

/// Lifecycle status of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Waiting for an operator command.
    Pending,
    /// Published; terminal.
    Posted,
    /// Rejected by the operator; terminal.
    Rejected,
}

impl DraftStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Posted => write!(f, "posted"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for DraftStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "posted" => Ok(Self::Posted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown draft status: {}", s)),
        }
    }
}

/// Stable draft id derived from its content and primary URL.
pub fn draft_id(summary: &str, primary_url: &str) -> String {
    story_key(&format!("{summary}{primary_url}"))
}

/// A candidate post awaiting or having received a human decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: String,
    /// Primary story reference (its URL).
    pub story_ref: String,
    pub source: String,
    pub url: String,
    pub summary: String,
    pub status: DraftStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweet_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announced_at: Option<DateTime<Utc>>,
}

impl Draft {
    /// Create a pending draft from a synthesized group.
    ///
    /// The first source URL becomes the primary reference; an empty list
    /// leaves it blank.
    pub fn from_group(summary: &str, source_urls: &[String], now: DateTime<Utc>) -> Self {
        let primary = source_urls.first().cloned().unwrap_or_default();
        Self {
            id: draft_id(summary, &primary),
            story_ref: primary.clone(),
            source: "Synthesized".to_string(),
            url: primary,
            summary: summary.to_string(),
            status: DraftStatus::Pending,
            created_at: now,
            updated_at: now,
            rejection_reason: None,
            tweet_url: None,
            announced_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == DraftStatus::Pending
    }
}
