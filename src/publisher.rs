//! Publisher — posts approved drafts to X (Twitter) with OAuth 1.0a user auth.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha1::Sha1;
use tracing::info;

use crate::config::TwitterCredentials;
use crate::error::PublishError;
use crate::retry::RetryPolicy;
use crate::sources::twitter::status_url;

const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// RFC 3986 unreserved characters stay as-is; everything else is encoded.
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A successfully published post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedTweet {
    pub id: String,
    pub url: String,
}

/// Destination for approved drafts.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `text` verbatim.
    async fn publish(&self, text: &str) -> Result<PostedTweet, PublishError>;
}

// ── OAuth 1.0a ──────────────────────────────────────────────────────

fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE).to_string()
}

/// Signature base string: `METHOD&url&sorted-encoded-params`.
pub fn signature_base(method: &str, url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> =
        params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
    encoded.sort();
    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&param_string)
    )
}

/// HMAC-SHA1 over the base string, keyed by `consumer_secret&token_secret`.
pub fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> Result<String, PublishError> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| PublishError::Signing(e.to_string()))?;
    mac.update(base.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization: OAuth ...` header for a JSON-bodied request.
///
/// JSON bodies are not part of the signature, only the oauth parameters.
pub fn authorization_header(
    method: &str,
    url: &str,
    creds: &TwitterCredentials,
    nonce: &str,
    timestamp: i64,
) -> Result<String, PublishError> {
    let timestamp = timestamp.to_string();
    let consumer_key = creds.consumer_key.expose_secret();
    let token = creds.access_token.expose_secret();
    let mut params = vec![
        ("oauth_consumer_key", consumer_key),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", token),
        ("oauth_version", "1.0"),
    ];

    let base = signature_base(method, url, &params);
    let signature = sign(
        &base,
        creds.consumer_secret.expose_secret(),
        creds.access_secret.expose_secret(),
    )?;
    params.push(("oauth_signature", signature.as_str()));
    params.sort();

    let fields = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

// ── Client ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

/// Posts through `POST /2/tweets` on behalf of the account owner.
pub struct TwitterPublisher {
    credentials: TwitterCredentials,
    api_base: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl TwitterPublisher {
    pub fn new(credentials: TwitterCredentials) -> Self {
        Self {
            credentials,
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

    async fn publish_once(&self, text: &str) -> Result<PostedTweet, PublishError> {
        let url = format!("{}/2/tweets", self.api_base);
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let auth = authorization_header(
            "POST",
            &url,
            &self.credentials,
            &nonce,
            chrono::Utc::now().timestamp(),
        )?;

        let resp = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| PublishError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateTweetResponse = resp
            .json()
            .await
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;
        Ok(PostedTweet {
            url: status_url(&created.data.id),
            id: created.data.id,
        })
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    async fn publish(&self, text: &str) -> Result<PostedTweet, PublishError> {
        let posted = self
            .retry
            .run("twitter.post", || self.publish_once(text))
            .await?;
        info!(tweet_id = %posted.id, "Published post");
        Ok(posted)
    }
}
