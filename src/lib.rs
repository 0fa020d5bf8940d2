//! GameStop content — human-in-the-loop draft review pipeline.

pub mod channels;
pub mod commands;
pub mod config;
pub mod drafts;
pub mod error;
pub mod ledger;
pub mod llm;
pub mod pipeline;
pub mod publisher;
pub mod retry;
pub mod sources;
pub mod state;
pub mod synthesis;
