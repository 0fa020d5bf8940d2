//! Per-channel read cursors.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Compare two platform message ids.
///
/// Snowflake ids are numeric and time-ordered; anything that fails to parse
/// falls back to length-then-lexicographic order, which agrees with numeric
/// order for digit strings.
pub fn compare_message_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

/// Last processed message id per channel (`{"channels": {...}}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CursorStore {
    #[serde(default)]
    channels: BTreeMap<String, String>,
}

impl CursorStore {
    pub fn get(&self, channel_id: &str) -> Option<&str> {
        self.channels.get(channel_id).map(String::as_str)
    }

    /// Move the cursor forward to `message_id`. Never moves backwards.
    ///
    /// Returns `true` if the cursor changed.
    pub fn advance(&mut self, channel_id: &str, message_id: &str) -> bool {
        match self.channels.get(channel_id) {
            Some(current) if compare_message_ids(message_id, current) != Ordering::Greater => false,
            _ => {
                self.channels
                    .insert(channel_id.to_string(), message_id.to_string());
                true
            }
        }
    }

    /// Whether `message_id` is strictly after the stored cursor.
    pub fn is_new(&self, channel_id: &str, message_id: &str) -> bool {
        self.get(channel_id)
            .is_none_or(|current| compare_message_ids(message_id, current) == Ordering::Greater)
    }
}
