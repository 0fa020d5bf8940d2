//! Brave web search — the fallback story feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::SourceError;
use crate::retry::RetryPolicy;
use crate::sources::{SEARCH_TOPIC, Story, StoryKind, StorySource};

const DEFAULT_API_BASE: &str = "https://api.search.brave.com";
const RESULT_COUNT: &str = "20";
const DEFAULT_SOURCE: &str = "Brave result";
const DEFAULT_TEXT: &str = "Update related to GameStop or Ryan Cohen";

#[derive(Debug, Default, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Debug, Default, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    age: Option<String>,
    page_age: Option<String>,
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    name: Option<String>,
}

/// Web search client keyed by a subscription token.
pub struct BraveSearch {
    api_key: SecretString,
    api_base: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl BraveSearch {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn search_once(&self) -> Result<BraveResponse, SourceError> {
        let url = format!("{}/res/v1/web/search", self.api_base);
        let query = format!("{SEARCH_TOPIC} latest news");
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", self.api_key.expose_secret())
            .query(&[("q", query.as_str()), ("count", RESULT_COUNT)])
            .send()
            .await
            .map_err(|e| SourceError::RequestFailed {
                source_name: "brave".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                source_name: "brave".into(),
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<BraveResponse>()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                source_name: "brave".into(),
                reason: e.to_string(),
            })
    }
}

/// Brave reports ages either as RFC 3339 or as free text ("2 days ago").
fn parse_age(result: &WebResult, now: DateTime<Utc>) -> DateTime<Utc> {
    [result.page_age.as_deref(), result.age.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                        .map(|t| t.and_utc())
                        .ok()
                })
        })
        .unwrap_or(now)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl StorySource for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    async fn fetch(&self) -> Result<Vec<Story>, SourceError> {
        let response = self.retry.run("brave.search", || self.search_once()).await?;
        let now = Utc::now();
        let stories: Vec<Story> = response
            .web
            .unwrap_or_default()
            .results
            .into_iter()
            .filter_map(|result| {
                let url = non_empty(result.url.clone())?;
                let published_at = parse_age(&result, now);
                let source = non_empty(result.profile.and_then(|p| p.name))
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
                let text = non_empty(result.description)
                    .or_else(|| non_empty(result.title))
                    .unwrap_or_else(|| DEFAULT_TEXT.to_string());
                Some(Story {
                    kind: StoryKind::News,
                    external_id: url.clone(),
                    source,
                    text,
                    url,
                    published_at,
                })
            })
            .collect();
        tracing::info!(count = stories.len(), "Brave search returned stories");
        Ok(stories)
    }
}
