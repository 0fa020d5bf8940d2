//! Synthesis — groups raw stories into summarized drafts with an LLM.
//!
//! Synthesis never fails: a provider error, an unparseable response, or a
//! response with no usable group falls back to one summary per story.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::drafts::fallback_summary;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::sources::Story;

/// A summary covering one or more stories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryGroup {
    /// Summary text ending with the primary URL.
    pub summary: String,
    /// URLs of the grouped stories; the first is primary.
    pub source_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GroupsResponse {
    #[serde(default)]
    groups: Vec<RawGroup>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    ids: Vec<i64>,
}

const SYSTEM_PROMPT: &str = "You are a content editor for a Twitter account covering \
GameStop (GME) and Ryan Cohen. Group related news and tweets and write ONE combined \
summary for each group.";

/// Calls the LLM to group and summarize stories.
pub struct Synthesizer {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }

    /// Group and summarize `stories`. Empty input makes no LLM call.
    pub async fn synthesize(&self, stories: &[Story]) -> Vec<StoryGroup> {
        if stories.is_empty() {
            return Vec::new();
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(stories)),
        ])
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
        .with_json_schema("story_groups", groups_schema());

        let content = match self.llm.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(error = %e, model = self.llm.model_name(), "Synthesis call failed, using fallback");
                return fallback_groups(stories);
            }
        };

        match parse_groups(&content, stories) {
            Some(groups) => {
                info!(stories = stories.len(), groups = groups.len(), "Synthesized stories");
                groups
            }
            None => {
                warn!(response = %content, "Unusable synthesis response, using fallback");
                fallback_groups(stories)
            }
        }
    }
}

/// Structured-output schema for `{"groups": [{"summary", "ids"}]}`.
fn groups_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "groups": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "summary": { "type": "string" },
                        "ids": { "type": "array", "items": { "type": "integer" } }
                    },
                    "required": ["summary", "ids"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["groups"],
        "additionalProperties": false
    })
}

/// Render the numbered story list and editorial rules.
fn build_prompt(stories: &[Story]) -> String {
    let listing: Vec<String> = stories
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "[{}] Source: {} | Text: \"{}\" | URL: {}",
                i + 1,
                s.source,
                s.text.replace(['\n', '\r'], " "),
                s.url
            )
        })
        .collect();

    format!(
        "INPUT STORIES:\n{listing}\n\n\
         INSTRUCTIONS:\n\
         1. Group stories that cover the same specific event or topic.\n\
         2. If a story is unrelated to the others, keep it as its own group.\n\
         3. Write a short summary for each group (max 240 chars).\n\
         \x20  - Casual, factual, plain English. No hype words (revolutionary, game-changer, moass).\n\
         \x20  - Do NOT use @mentions or hashtags.\n\
         4. Return JSON of the form:\n\
         {{\"groups\": [{{\"summary\": \"string\", \"ids\": [1, 3]}}]}}",
        listing = listing.join("\n")
    )
}

/// Strip an optional markdown code fence around a JSON body.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Map 1-based ids back to URLs. `None` when nothing usable remains.
fn parse_groups(content: &str, stories: &[Story]) -> Option<Vec<StoryGroup>> {
    let parsed: GroupsResponse = serde_json::from_str(strip_code_fence(content)).ok()?;

    let groups: Vec<StoryGroup> = parsed
        .groups
        .into_iter()
        .filter_map(|group| {
            let summary = group.summary.trim();
            if summary.is_empty() {
                return None;
            }
            let source_urls: Vec<String> = group
                .ids
                .iter()
                .filter_map(|&id| usize::try_from(id).ok()?.checked_sub(1))
                .filter_map(|idx| stories.get(idx))
                .map(|s| s.url.clone())
                .filter(|url| !url.is_empty())
                .collect();
            let primary = source_urls.first()?;
            Some(StoryGroup {
                summary: format!("{summary} {primary}"),
                source_urls,
            })
        })
        .collect();

    if groups.is_empty() { None } else { Some(groups) }
}

/// One group per story, used whenever the LLM result is unusable.
pub fn fallback_groups(stories: &[Story]) -> Vec<StoryGroup> {
    stories
        .iter()
        .map(|s| StoryGroup {
            summary: fallback_summary(&s.source, &s.text, &s.url),
            source_urls: vec![s.url.clone()],
        })
        .collect()
}
