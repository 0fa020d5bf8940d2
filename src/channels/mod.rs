//! Chat channel abstraction used for announcements, commands, and monitoring.

pub mod cursor;
pub mod discord;

pub use cursor::CursorStore;
pub use discord::DiscordChannel;

use async_trait::async_trait;

use crate::error::ChannelError;

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Platform message id (numeric, time-ordered).
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub author_is_bot: bool,
}

/// Chat transport for the review loop.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Resolve (and create if needed) the channel where drafts are reviewed.
    async fn ensure_review_channel(&self) -> Result<String, ChannelError>;

    /// Post a text message.
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), ChannelError>;

    /// Messages strictly after `after`, sorted by ascending id.
    async fn messages_after(
        &self,
        channel_id: &str,
        after: Option<&str>,
    ) -> Result<Vec<ChannelMessage>, ChannelError>;

    /// The pipeline's own user id, so its messages can be skipped.
    async fn bot_user_id(&self) -> Result<String, ChannelError>;
}

/// Split a message into chunks that fit a platform's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let hard_cut = match remaining.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        let window = &remaining[..hard_cut];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(hard_cut);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
