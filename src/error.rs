//! Error types for the draft review pipeline.

use std::path::PathBuf;

/// Top-level error type for a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Story source error: {0}")]
    Source(#[from] SourceError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),
}

/// Errors from the story search adapters.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{source_name} search request failed: {reason}")]
    RequestFailed { source_name: String, reason: String },

    #[error("{source_name} search returned {status}: {body}")]
    Status {
        source_name: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {source_name}: {reason}")]
    InvalidResponse { source_name: String, reason: String },
}

/// Chat channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("{method} {path} failed: {reason}")]
    RequestFailed {
        method: String,
        path: String,
        reason: String,
    },

    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response for {path}: {reason}")]
    InvalidResponse { path: String, reason: String },
}

/// Social posting errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Post request failed: {0}")]
    RequestFailed(String),

    #[error("Post rejected with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid post response: {0}")]
    InvalidResponse(String),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

/// LLM provider errors. Absorbed by the synthesis fallback, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Persistence errors for the JSON state files.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_vars_lists_every_name() {
        let err = ConfigError::MissingEnvVars(vec!["A_KEY".into(), "B_KEY".into()]);
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: A_KEY, B_KEY"
        );
    }

    #[test]
    fn top_level_wraps_channel_errors() {
        let err: Error = ChannelError::Status {
            method: "GET".into(),
            path: "/users/@me".into(),
            status: 401,
            body: "unauthorized".into(),
        }
        .into();
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().starts_with("Channel error"));
    }
}
