//! Drafts — data model, lifecycle store, and text formatting.

pub mod format;
pub mod model;
pub mod store;

pub use format::{build_tweet_text, fallback_summary, format_summary};
pub use model::{Draft, DraftStatus, draft_id};
pub use store::{DEFAULT_BULK_REASON, DraftRefusal, DraftStore};
