//! Discord channel — REST v10 client for the review and monitoring channels.

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::channels::cursor::compare_message_ids;
use crate::channels::{ChannelMessage, CommandChannel, split_message};
use crate::config::DiscordConfig;
use crate::error::ChannelError;
use crate::retry::RetryPolicy;

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Maximum message length for Discord's create-message API.
const DISCORD_MAX_MESSAGE_LENGTH: usize = 2000;

/// Page size for the message list endpoint (Discord's maximum).
const PAGE_LIMIT: usize = 100;

/// Upper bound on pages read per run.
const MAX_PAGES: usize = 10;

/// Name of the review channel created when none is configured.
pub const NEWS_CHANNEL_NAME: &str = "gamestop-news-twitter";
const NEWS_CHANNEL_TOPIC: &str = "Draft GameStop and Ryan Cohen updates for command review";

/// Guild text channel type.
const GUILD_TEXT: u8 = 0;

#[derive(Debug, Deserialize)]
struct DiscordChannelInfo {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: DiscordUser,
}

impl From<DiscordMessage> for ChannelMessage {
    fn from(msg: DiscordMessage) -> Self {
        Self {
            id: msg.id,
            content: msg.content,
            author_id: msg.author.id,
            author_is_bot: msg.author.bot,
        }
    }
}

/// Discord bot client.
pub struct DiscordChannel {
    bot_token: SecretString,
    guild_id: String,
    news_channel_id: Option<String>,
    api_base: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    bot_user_id: OnceCell<String>,
}

impl DiscordChannel {
    pub fn new(config: &DiscordConfig) -> Self {
        Self {
            bot_token: config.bot_token.clone(),
            guild_id: config.guild_id.clone(),
            news_channel_id: config.news_channel_id.clone(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
            bot_user_id: OnceCell::new(),
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

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// Issue one request and decode the JSON body (`None` for 204).
    async fn request_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Option<T>, ChannelError> {
        let mut req = self
            .client
            .request(method.clone(), self.api_url(path))
            .header(
                "Authorization",
                format!("Bot {}", self.bot_token.expose_secret()),
            )
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| ChannelError::RequestFailed {
            method: method.to_string(),
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|e| ChannelError::InvalidResponse {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Option<T>, ChannelError> {
        let label = format!("discord {method} {path}");
        self.retry
            .run(&label, || self.request_once(method.clone(), path, query, body))
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ChannelError> {
        self.request(Method::GET, path, query, None)
            .await?
            .ok_or_else(|| ChannelError::InvalidResponse {
                path: path.to_string(),
                reason: "empty response body".to_string(),
            })
    }

    async fn guild_channels(&self) -> Result<Vec<DiscordChannelInfo>, ChannelError> {
        self.get_json(&format!("/guilds/{}/channels", self.guild_id), &[])
            .await
    }
}

#[async_trait]
impl CommandChannel for DiscordChannel {
    async fn ensure_review_channel(&self) -> Result<String, ChannelError> {
        if let Some(id) = &self.news_channel_id {
            return Ok(id.clone());
        }

        let existing = self
            .guild_channels()
            .await?
            .into_iter()
            .find(|c| c.kind == GUILD_TEXT && c.name.as_deref() == Some(NEWS_CHANNEL_NAME));
        if let Some(channel) = existing {
            return Ok(channel.id);
        }

        tracing::info!(name = NEWS_CHANNEL_NAME, "Creating review channel");
        let body = serde_json::json!({
            "name": NEWS_CHANNEL_NAME,
            "type": GUILD_TEXT,
            "topic": NEWS_CHANNEL_TOPIC,
        });
        let path = format!("/guilds/{}/channels", self.guild_id);
        let created: Option<DiscordChannelInfo> =
            self.request(Method::POST, &path, &[], Some(&body)).await?;
        created
            .map(|c| c.id)
            .ok_or_else(|| ChannelError::InvalidResponse {
                path,
                reason: "channel creation returned no body".to_string(),
            })
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), ChannelError> {
        let path = format!("/channels/{channel_id}/messages");
        for chunk in split_message(content, DISCORD_MAX_MESSAGE_LENGTH) {
            let body = serde_json::json!({ "content": chunk });
            let _: Option<serde_json::Value> =
                self.request(Method::POST, &path, &[], Some(&body)).await?;
        }
        Ok(())
    }

    async fn messages_after(
        &self,
        channel_id: &str,
        after: Option<&str>,
    ) -> Result<Vec<ChannelMessage>, ChannelError> {
        let path = format!("/channels/{channel_id}/messages");
        let mut cursor = after.map(str::to_string);
        let mut all: Vec<ChannelMessage> = Vec::new();

        for _ in 0..MAX_PAGES {
            let mut query = vec![("limit", PAGE_LIMIT.to_string())];
            if let Some(after) = &cursor {
                query.push(("after", after.clone()));
            }
            let page: Vec<DiscordMessage> = self.get_json(&path, &query).await?;
            let page_len = page.len();

            let newest = page
                .iter()
                .map(|m| m.id.as_str())
                .max_by(|a, b| compare_message_ids(a, b))
                .map(str::to_string);
            all.extend(page.into_iter().map(ChannelMessage::from));

            match newest {
                Some(id) if page_len >= PAGE_LIMIT => cursor = Some(id),
                _ => break,
            }
        }

        all.sort_by(|a, b| compare_message_ids(&a.id, &b.id));
        all.dedup_by(|a, b| a.id == b.id);
        tracing::debug!(channel_id, count = all.len(), "Fetched channel messages");
        Ok(all)
    }

    async fn bot_user_id(&self) -> Result<String, ChannelError> {
        self.bot_user_id
            .get_or_try_init(|| async {
                let user: DiscordUser = self.get_json("/users/@me", &[]).await?;
                Ok::<_, ChannelError>(user.id)
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn config(news_channel_id: Option<&str>) -> DiscordConfig {
        DiscordConfig {
            bot_token: SecretString::from("bot-token"),
            guild_id: "guild1".to_string(),
            monitoring_channel_id: "mon".to_string(),
            news_channel_id: news_channel_id.map(str::to_string),
        }
    }

    fn channel(base: &str, news: Option<&str>) -> DiscordChannel {
        DiscordChannel::new(&config(news))
            .with_api_base(base)
            .with_retry(RetryPolicy::immediate(0))
    }

    #[tokio::test]
    async fn configured_review_channel_skips_lookup() {
        let ch = channel("http://127.0.0.1:9", Some("777"));
        assert_eq!(ch.ensure_review_channel().await.unwrap(), "777");
    }

    #[tokio::test]
    async fn finds_existing_review_channel_by_name() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/guilds/guild1/channels")
            .match_header("authorization", "Bot bot-token")
            .with_status(200)
            .with_body(
                r#"[{"id":"1","name":"general","type":0},
                    {"id":"2","name":"gamestop-news-twitter","type":2},
                    {"id":"3","name":"gamestop-news-twitter","type":0}]"#,
            )
            .create_async()
            .await;

        let ch = channel(&server.url(), None);
        assert_eq!(ch.ensure_review_channel().await.unwrap(), "3");
    }

    #[tokio::test]
    async fn creates_review_channel_when_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/guilds/guild1/channels")
            .with_status(200)
            .with_body(r#"[{"id":"1","name":"general","type":0}]"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/guilds/guild1/channels")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "name": NEWS_CHANNEL_NAME,
                "type": 0
            })))
            .with_status(201)
            .with_body(r#"{"id":"99","name":"gamestop-news-twitter","type":0}"#)
            .create_async()
            .await;

        let ch = channel(&server.url(), None);
        assert_eq!(ch.ensure_review_channel().await.unwrap(), "99");
        create.assert_async().await;
    }

    #[tokio::test]
    async fn messages_are_sorted_ascending_and_use_after() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/channels/55/messages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "100".into()),
                Matcher::UrlEncoded("after".into(), "1000".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"[{"id":"1003","content":"Approve abc","author":{"id":"u1"}},
                    {"id":"1001","content":"hi","author":{"id":"b","bot":true}},
                    {"id":"1002","content":"Reject all","author":{"id":"u1"}}]"#,
            )
            .create_async()
            .await;

        let ch = channel(&server.url(), Some("55"));
        let messages = ch.messages_after("55", Some("1000")).await.unwrap();
        mock.assert_async().await;

        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1001", "1002", "1003"]);
        assert!(messages[0].author_is_bot);
        assert!(!messages[2].author_is_bot);
    }

    #[tokio::test]
    async fn send_message_posts_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/channels/55/messages")
            .match_body(Matcher::Json(serde_json::json!({ "content": "hello" })))
            .with_status(200)
            .with_body(r#"{"id":"2000","content":"hello","author":{"id":"bot","bot":true}}"#)
            .create_async()
            .await;

        let ch = channel(&server.url(), Some("55"));
        ch.send_message("55", "hello").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn bot_user_id_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/@me")
            .with_status(200)
            .with_body(r#"{"id":"bot42","username":"pipeline","bot":true}"#)
            .expect(1)
            .create_async()
            .await;

        let ch = channel(&server.url(), Some("55"));
        assert_eq!(ch.bot_user_id().await.unwrap(), "bot42");
        assert_eq!(ch.bot_user_id().await.unwrap(), "bot42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_failure_is_typed_status_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/@me")
            .with_status(401)
            .with_body(r#"{"message":"401: Unauthorized"}"#)
            .create_async()
            .await;

        let ch = channel(&server.url(), Some("55"));
        let err = ch.bot_user_id().await.unwrap_err();
        assert!(matches!(err, ChannelError::Status { status: 401, .. }));
    }
}
