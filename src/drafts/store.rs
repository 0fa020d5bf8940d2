//! Draft store — insertion-ordered collection with the review lifecycle.
//!
//! Allowed transitions:
//! - pending → posted   (approve, after a successful publish)
//! - pending → rejected (reject, reject all)
//! - pending → pending  (revise)
//!
//! `posted` and `rejected` are terminal; commands against them are refused
//! with [`DraftRefusal::AlreadyResolved`] and leave the draft untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::format::format_summary;
use super::model::{Draft, DraftStatus};

/// Reason used by `reject all` when the operator gives none.
pub const DEFAULT_BULK_REASON: &str = "Bulk rejection";

/// Why a command could not be applied to a draft.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftRefusal {
    #[error("Could not find draft {0}.")]
    NotFound(String),

    #[error("Draft {id} is already {status}. Action skipped.")]
    AlreadyResolved { id: String, status: DraftStatus },
}

/// Persisted draft collection (`{"drafts": [...]}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftStore {
    #[serde(default)]
    drafts: Vec<Draft>,
}

impl DraftStore {
    /// Insert a draft unless one with the same id exists. Returns whether it was added.
    pub fn add(&mut self, draft: Draft) -> bool {
        if self.drafts.iter().any(|d| d.id == draft.id) {
            debug!(draft_id = %draft.id, "Draft already exists, skipping");
            return false;
        }
        info!(draft_id = %draft.id, "Draft added");
        self.drafts.push(draft);
        true
    }

    /// Case-insensitive exact id lookup.
    pub fn find_by_id(&self, id: &str) -> Option<&Draft> {
        self.drafts.iter().find(|d| d.id.eq_ignore_ascii_case(id))
    }

    fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Draft> {
        self.drafts.iter_mut().find(|d| d.id.eq_ignore_ascii_case(id))
    }

    /// All drafts in insertion order.
    pub fn all(&self) -> &[Draft] {
        &self.drafts
    }

    pub fn pending_count(&self) -> usize {
        self.drafts.iter().filter(|d| d.is_pending()).count()
    }

    /// Ids of pending drafts that have not been shown in the review channel yet.
    pub fn unannounced_pending_ids(&self) -> Vec<String> {
        self.drafts
            .iter()
            .filter(|d| d.is_pending() && d.announced_at.is_none())
            .map(|d| d.id.clone())
            .collect()
    }

    /// Record the first announcement. Returns `false` if already announced.
    pub fn mark_announced(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.find_by_id_mut(id) {
            Some(draft) if draft.announced_at.is_none() => {
                draft.announced_at = Some(now);
                draft.updated_at = now;
                true
            }
            _ => false,
        }
    }

    /// Look up a pending draft for publishing without changing it.
    pub fn pending_draft(&self, id: &str) -> Result<&Draft, DraftRefusal> {
        let draft = self
            .find_by_id(id)
            .ok_or_else(|| DraftRefusal::NotFound(id.to_string()))?;
        if draft.status.is_terminal() {
            return Err(DraftRefusal::AlreadyResolved {
                id: draft.id.clone(),
                status: draft.status,
            });
        }
        Ok(draft)
    }

    fn pending_draft_mut(&mut self, id: &str) -> Result<&mut Draft, DraftRefusal> {
        let draft = self
            .find_by_id_mut(id)
            .ok_or_else(|| DraftRefusal::NotFound(id.to_string()))?;
        if draft.status.is_terminal() {
            return Err(DraftRefusal::AlreadyResolved {
                id: draft.id.clone(),
                status: draft.status,
            });
        }
        Ok(draft)
    }

    /// pending → posted, once the publish call has succeeded.
    pub fn mark_posted(
        &mut self,
        id: &str,
        tweet_url: &str,
        now: DateTime<Utc>,
    ) -> Result<&Draft, DraftRefusal> {
        let draft = self.pending_draft_mut(id)?;
        draft.status = DraftStatus::Posted;
        draft.tweet_url = Some(tweet_url.to_string());
        draft.updated_at = now;
        info!(draft_id = %draft.id, tweet_url, "Draft posted");
        Ok(&*draft)
    }

    /// pending → pending with a re-formatted summary.
    pub fn revise(
        &mut self,
        id: &str,
        new_text: &str,
        now: DateTime<Utc>,
    ) -> Result<&Draft, DraftRefusal> {
        let draft = self.pending_draft_mut(id)?;
        draft.summary = format_summary(&draft.source, new_text, &draft.url);
        draft.status = DraftStatus::Pending;
        draft.updated_at = now;
        info!(draft_id = %draft.id, "Draft revised");
        Ok(&*draft)
    }

    /// pending → rejected with a reason.
    pub fn reject(
        &mut self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<&Draft, DraftRefusal> {
        let draft = self.pending_draft_mut(id)?;
        draft.status = DraftStatus::Rejected;
        draft.rejection_reason = Some(reason.to_string());
        draft.updated_at = now;
        info!(draft_id = %draft.id, reason, "Draft rejected");
        Ok(&*draft)
    }

    /// Reject every pending draft. Returns how many were rejected.
    pub fn reject_all(&mut self, reason: &str, now: DateTime<Utc>) -> usize {
        let reason = if reason.trim().is_empty() {
            DEFAULT_BULK_REASON
        } else {
            reason
        };
        let mut count = 0;
        for draft in self.drafts.iter_mut().filter(|d| d.is_pending()) {
            draft.status = DraftStatus::Rejected;
            draft.rejection_reason = Some(reason.to_string());
            draft.updated_at = now;
            count += 1;
        }
        info!(count, reason, "Rejected all pending drafts");
        count
    }
}
