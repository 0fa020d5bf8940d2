//! Story sources — external search feeds normalized to [`Story`].

pub mod brave;
pub mod twitter;

pub use brave::BraveSearch;
pub use twitter::TwitterSearch;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SourceError;
use crate::ledger::{Ledger, story_key};

/// Search terms shared by both feeds.
pub const SEARCH_TOPIC: &str = "GameStop OR GME OR Ryan Cohen";

/// Where a story came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryKind {
    Tweet,
    News,
}

/// A candidate item fetched from a feed. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub kind: StoryKind,
    pub external_id: String,
    pub source: String,
    pub text: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

impl Story {
    /// Ledger key: the external id, or the URL when no id is available.
    pub fn ledger_key(&self) -> String {
        if self.external_id.is_empty() {
            story_key(&self.url)
        } else {
            story_key(&self.external_id)
        }
    }
}

/// A read-only search feed.
#[async_trait]
pub trait StorySource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fetch the current batch of candidate stories.
    async fn fetch(&self) -> Result<Vec<Story>, SourceError>;
}

/// Drop stories the ledger has already seen.
pub fn filter_unseen(stories: Vec<Story>, ledger: &Ledger) -> Vec<Story> {
    stories
        .into_iter()
        .filter(|story| !ledger.is_seen(&story.ledger_key()))
        .collect()
}

/// Fetch from `primary`; consult `secondary` only if nothing new came back.
pub async fn fetch_new_stories(
    primary: &dyn StorySource,
    secondary: &dyn StorySource,
    ledger: &Ledger,
) -> Result<Vec<Story>, SourceError> {
    info!(source = primary.name(), "Fetching stories");
    let fresh = filter_unseen(primary.fetch().await?, ledger);
    if !fresh.is_empty() {
        return Ok(fresh);
    }

    info!(
        primary = primary.name(),
        secondary = secondary.name(),
        "No new stories from primary feed, falling back"
    );
    Ok(filter_unseen(secondary.fetch().await?, ledger))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    pub fn story(kind: StoryKind, id: &str) -> Story {
        Story {
            kind,
            external_id: id.to_string(),
            source: "Twitter".to_string(),
            text: format!("GameStop update {id}"),
            url: format!("https://x.com/i/web/status/{id}"),
            published_at: Utc::now(),
        }
    }

    /// Feed returning a fixed batch and counting calls.
    pub struct FixedSource {
        pub name: &'static str,
        pub stories: Vec<Story>,
        pub calls: AtomicUsize,
    }

    impl FixedSource {
        pub fn new(name: &'static str, stories: Vec<Story>) -> Self {
            Self {
                name,
                stories,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StorySource for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self) -> Result<Vec<Story>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.stories.clone())
        }
    }
}
