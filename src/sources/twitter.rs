//! X (Twitter) recent search — the primary story feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::SourceError;
use crate::retry::RetryPolicy;
use crate::sources::{Story, StoryKind, StorySource};

const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const SEARCH_QUERY: &str = r#"(GameStop OR GME OR "Ryan Cohen") lang:en -is:retweet"#;
const MAX_RESULTS: u32 = 20;

/// Public URL for a post id.
pub fn status_url(id: &str) -> String {
    format!("https://x.com/i/web/status/{id}")
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Recent-search client using an app-only bearer token.
pub struct TwitterSearch {
    bearer_token: SecretString,
    api_base: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl TwitterSearch {
    pub fn new(bearer_token: SecretString) -> Self {
        Self {
            bearer_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point the client at a different host (tests, proxies).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn search_once(&self) -> Result<SearchResponse, SourceError> {
        let url = format!("{}/2/tweets/search/recent", self.api_base);
        let max_results = MAX_RESULTS.to_string();
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.bearer_token.expose_secret())
            .query(&[
                ("query", SEARCH_QUERY),
                ("max_results", max_results.as_str()),
                ("expansions", "author_id"),
                ("tweet.fields", "created_at,author_id,text"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::RequestFailed {
                source_name: "twitter".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                source_name: "twitter".into(),
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<SearchResponse>()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                source_name: "twitter".into(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl StorySource for TwitterSearch {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn fetch(&self) -> Result<Vec<Story>, SourceError> {
        let response = self.retry.run("twitter.search", || self.search_once()).await?;
        let now = Utc::now();
        let stories: Vec<Story> = response
            .data
            .into_iter()
            .map(|tweet| Story {
                kind: StoryKind::Tweet,
                url: status_url(&tweet.id),
                external_id: tweet.id,
                source: "Twitter".to_string(),
                text: tweet.text,
                published_at: tweet.created_at.unwrap_or(now),
            })
            .collect();
        tracing::info!(count = stories.len(), "Twitter search returned stories");
        Ok(stories)
    }
}
