//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default chat model used for story synthesis.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Directory for `latest.log` when `GAMESTOP_LOG_DIR` is unset.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Environment variables that must be present before any I/O happens.
pub const REQUIRED_VARS: &[&str] = &[
    "OPENCLAW_BRAVE_API_KEY",
    "DISCORD_BOT_TOKEN",
    "DISCORD_GUILD_ID",
    "DISCORD_MONITORING_CHANNEL_ID",
    "TWITTER_CONSUMER_KEY",
    "TWITTER_CONSUMER_SECRET",
    "TWITTER_ACCESS_TOKEN",
    "TWITTER_ACCESS_SECRET",
    "TWITTER_BEARER_TOKEN",
    "OPENAI_API_KEY",
];

/// OAuth 1.0a user-context credentials for posting.
#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub access_token: SecretString,
    pub access_secret: SecretString,
    /// App-only token used for recent search.
    pub bearer_token: SecretString,
}

/// Discord bot settings.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub guild_id: String,
    pub monitoring_channel_id: String,
    /// Review channel; looked up or created in the guild when unset.
    pub news_channel_id: Option<String>,
}

/// Full runtime configuration for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub brave_api_key: SecretString,
    pub openai_api_key: SecretString,
    pub openai_model: String,
    pub discord: DiscordConfig,
    pub twitter: TwitterCredentials,
    /// Root for `history/` and `state/`.
    pub state_dir: PathBuf,
}

impl Config {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Every missing required key is reported in a single error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|key| get(**key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvVars(missing));
        }

        let required = |key: &str| get(key).unwrap_or_default();
        let secret = |key: &str| SecretString::from(required(key));

        Ok(Self {
            brave_api_key: secret("OPENCLAW_BRAVE_API_KEY"),
            openai_api_key: secret("OPENAI_API_KEY"),
            openai_model: get("GAMESTOP_OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            discord: DiscordConfig {
                bot_token: secret("DISCORD_BOT_TOKEN"),
                guild_id: required("DISCORD_GUILD_ID"),
                monitoring_channel_id: required("DISCORD_MONITORING_CHANNEL_ID"),
                news_channel_id: get("DISCORD_NEWS_GAMESTOP_CHANNEL_ID"),
            },
            twitter: TwitterCredentials {
                consumer_key: secret("TWITTER_CONSUMER_KEY"),
                consumer_secret: secret("TWITTER_CONSUMER_SECRET"),
                access_token: secret("TWITTER_ACCESS_TOKEN"),
                access_secret: secret("TWITTER_ACCESS_SECRET"),
                bearer_token: secret("TWITTER_BEARER_TOKEN"),
            },
            state_dir: get("GAMESTOP_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

/// Log directory from the environment alone, so logging can start before
/// the rest of the configuration is validated.
pub fn log_dir_from_env() -> PathBuf {
    log_dir_from(
        std::env::var("GAMESTOP_LOG_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty()),
    )
}

fn log_dir_from(value: Option<String>) -> PathBuf {
    value
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
}
