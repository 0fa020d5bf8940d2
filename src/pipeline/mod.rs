//! Run orchestrator — one invocation of the draft review loop.
//!
//! Flow:
//! 1. Load ledger, drafts, and cursors
//! 2. Optionally fetch, dedup, synthesize, and store new drafts
//! 3. Announce unannounced pending drafts in the review channel
//! 4. Apply operator commands posted after the channel cursor
//! 5. Save state
//! 6. Post a status line to the monitoring channel
//!
//! Any error aborts the remaining steps and is returned to the caller.

pub mod monitor;

pub use monitor::RunReport;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::channels::{ChannelMessage, CommandChannel};
use crate::commands::{Command, parse_command};
use crate::drafts::{Draft, build_tweet_text};
use crate::error::Result;
use crate::publisher::Publisher;
use crate::sources::{StorySource, fetch_new_stories};
use crate::state::{PipelineState, StateFiles};
use crate::synthesis::Synthesizer;

/// Everything a run talks to.
pub struct Pipeline {
    primary: Arc<dyn StorySource>,
    secondary: Arc<dyn StorySource>,
    synthesizer: Synthesizer,
    channel: Arc<dyn CommandChannel>,
    publisher: Arc<dyn Publisher>,
    state: StateFiles,
    monitoring_channel_id: String,
}

impl Pipeline {
    pub fn new(
        primary: Arc<dyn StorySource>,
        secondary: Arc<dyn StorySource>,
        synthesizer: Synthesizer,
        channel: Arc<dyn CommandChannel>,
        publisher: Arc<dyn Publisher>,
        state: StateFiles,
        monitoring_channel_id: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            secondary,
            synthesizer,
            channel,
            publisher,
            state,
            monitoring_channel_id: monitoring_channel_id.into(),
        }
    }

    /// Execute one run. `fetch` enables the fetch-and-synthesize step.
    pub async fn run(&self, fetch: bool) -> Result<RunReport> {
        let mut state = self.state.load()?;
        debug!(
            seen = state.ledger.len(),
            drafts = state.drafts.all().len(),
            "Loaded state"
        );

        if fetch {
            self.ingest(&mut state).await?;
        } else {
            info!("Skipping fetch, processing review commands only");
        }

        let review_channel = self.channel.ensure_review_channel().await?;
        self.announce_pending(&mut state, &review_channel).await?;
        let posted = self.process_commands(&mut state, &review_channel).await?;

        self.state.save(&state)?;

        let report = RunReport {
            posted,
            pending: state.drafts.pending_count(),
            fetched: fetch,
        };
        info!(
            posted = report.posted,
            pending = report.pending,
            fetched = report.fetched,
            "Run complete"
        );

        let line = monitor::status_line(&monitor::clock_now(), &report);
        self.notify_monitoring(&line).await;
        Ok(report)
    }

    /// Post an error alert for a failed run. Never fails.
    pub async fn report_failure(&self, error_text: &str) {
        let alert = monitor::error_alert(&monitor::clock_now(), error_text);
        self.notify_monitoring(&alert).await;
    }

    async fn notify_monitoring(&self, text: &str) {
        if let Err(e) = self
            .channel
            .send_message(&self.monitoring_channel_id, text)
            .await
        {
            warn!(error = %e, "Failed to post to monitoring channel");
        }
    }

    // ── Fetch & synthesize ──────────────────────────────────────────

    async fn ingest(&self, state: &mut PipelineState) -> Result<()> {
        let stories =
            fetch_new_stories(self.primary.as_ref(), self.secondary.as_ref(), &state.ledger)
                .await?;
        if stories.is_empty() {
            info!("No new stories found");
            return Ok(());
        }

        info!(count = stories.len(), "Found new stories, synthesizing");
        for story in &stories {
            state.ledger.mark_seen(&story.ledger_key());
        }

        let now = Utc::now();
        let mut added = 0;
        for group in self.synthesizer.synthesize(&stories).await {
            if state
                .drafts
                .add(Draft::from_group(&group.summary, &group.source_urls, now))
            {
                added += 1;
            }
        }
        info!(added, "Created drafts");
        Ok(())
    }

    // ── Review channel ──────────────────────────────────────────────

    async fn announce_pending(&self, state: &mut PipelineState, channel_id: &str) -> Result<()> {
        for id in state.drafts.unannounced_pending_ids() {
            let Some(draft) = state.drafts.find_by_id(&id) else {
                continue;
            };
            let text = announcement(draft);
            self.channel.send_message(channel_id, &text).await?;
            state.drafts.mark_announced(&id, Utc::now());
        }
        Ok(())
    }

    /// Apply every new message in order. Returns how many drafts were posted.
    async fn process_commands(&self, state: &mut PipelineState, channel_id: &str) -> Result<usize> {
        let messages = self
            .channel
            .messages_after(channel_id, state.cursors.get(channel_id))
            .await?;
        if messages.is_empty() {
            return Ok(0);
        }

        let bot_id = self.channel.bot_user_id().await?;
        let mut posted = 0;

        for message in messages {
            if !state.cursors.is_new(channel_id, &message.id) {
                continue;
            }
            state.cursors.advance(channel_id, &message.id);

            if is_own_or_bot(&message, &bot_id) {
                continue;
            }
            let Some(command) = parse_command(&message.content) else {
                continue;
            };
            debug!(message_id = %message.id, ?command, "Applying command");

            let reply = self.apply(state, command, &mut posted).await?;
            self.channel.send_message(channel_id, &reply).await?;
        }

        Ok(posted)
    }

    /// Apply one command and return the reply text.
    async fn apply(
        &self,
        state: &mut PipelineState,
        command: Command,
        posted: &mut usize,
    ) -> Result<String> {
        let now = Utc::now();
        let reply = match command {
            Command::RejectAll { reason } => {
                let count = state.drafts.reject_all(&reason, now);
                format!(
                    "Processed Reject All: marked {count} pending drafts as rejected. Reason: {reason}"
                )
            }
            Command::Approve { draft_id } => {
                let text = match state.drafts.pending_draft(&draft_id) {
                    Ok(draft) => build_tweet_text(&draft.summary),
                    Err(refusal) => return Ok(refusal.to_string()),
                };
                let tweet = self.publisher.publish(&text).await?;
                match state.drafts.mark_posted(&draft_id, &tweet.url, now) {
                    Ok(draft) => {
                        *posted += 1;
                        format!("Posted {}: {}", draft.id, tweet.url)
                    }
                    Err(refusal) => refusal.to_string(),
                }
            }
            Command::Revise { draft_id, new_text } => {
                match state.drafts.revise(&draft_id, &new_text, now) {
                    Ok(draft) => format!("Revised {}. It is still pending.", draft.id),
                    Err(refusal) => refusal.to_string(),
                }
            }
            Command::Reject { draft_id, reason } => {
                match state.drafts.reject(&draft_id, &reason, now) {
                    Ok(draft) => format!("Rejected {}. Reason saved.", draft.id),
                    Err(refusal) => refusal.to_string(),
                }
            }
        };
        Ok(reply)
    }
}

fn is_own_or_bot(message: &ChannelMessage, bot_id: &str) -> bool {
    message.author_is_bot || message.author_id == bot_id
}

/// Review channel text for a newly pending draft.
pub fn announcement(draft: &Draft) -> String {
    format!(
        "Draft {id}\n> {summary}\nCommands: `Approve {id}`, `Revise {id} <new text>`, `Reject {id} <reason>`, `Reject all [reason]`",
        id = draft.id,
        summary = draft.summary
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::channels::test_support::MemoryChannel;
    use crate::drafts::DraftStatus;
    use crate::error::{Error, PublishError};
    use crate::publisher::PostedTweet;
    use crate::sources::StoryKind;
    use crate::sources::test_support::{FixedSource, story};
    use crate::synthesis::test_support::ScriptedLlm;

    const REVIEW: &str = "review";
    const MONITOR: &str = "monitor";

    /// Publisher that records texts, or fails every call.
    struct FakePublisher {
        fail: bool,
        texts: Mutex<Vec<String>>,
    }

    impl FakePublisher {
        fn ok() -> Self {
            Self {
                fail: false,
                texts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                texts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(&self, text: &str) -> std::result::Result<PostedTweet, PublishError> {
            if self.fail {
                return Err(PublishError::Status {
                    status: 403,
                    body: "Forbidden".into(),
                });
            }
            let mut texts = self.texts.lock().unwrap();
            texts.push(text.to_string());
            let id = format!("90{}", texts.len());
            Ok(PostedTweet {
                url: format!("https://x.com/i/web/status/{id}"),
                id,
            })
        }
    }

    struct Harness {
        _tmp: TempDir,
        files: StateFiles,
        primary: Arc<FixedSource>,
        secondary: Arc<FixedSource>,
        channel: Arc<MemoryChannel>,
        publisher: Arc<FakePublisher>,
    }

    impl Harness {
        fn new(stories: usize, publisher: FakePublisher) -> Self {
            let tmp = TempDir::new().unwrap();
            let files = StateFiles::new(tmp.path());
            let batch = (1..=stories)
                .map(|i| story(StoryKind::Tweet, &i.to_string()))
                .collect();
            Self {
                _tmp: tmp,
                files,
                primary: Arc::new(FixedSource::new("twitter", batch)),
                secondary: Arc::new(FixedSource::new("brave", Vec::new())),
                channel: Arc::new(MemoryChannel::new(REVIEW)),
                publisher: Arc::new(publisher),
            }
        }

        fn pipeline(&self) -> Pipeline {
            Pipeline::new(
                self.primary.clone(),
                self.secondary.clone(),
                Synthesizer::new(Arc::new(ScriptedLlm::failing())),
                self.channel.clone(),
                self.publisher.clone(),
                self.files.clone(),
                MONITOR,
            )
        }

        fn draft_ids(&self) -> Vec<String> {
            let state = self.files.load().unwrap();
            state.drafts.all().iter().map(|d| d.id.clone()).collect()
        }

        fn announcements(&self) -> usize {
            self.channel
                .sent_to(REVIEW)
                .iter()
                .filter(|m| m.starts_with("Draft "))
                .count()
        }
    }

    #[tokio::test]
    async fn fetch_creates_and_announces_drafts_once() {
        let h = Harness::new(3, FakePublisher::ok());
        let report = h.pipeline().run(true).await.unwrap();
        assert_eq!(
            report,
            RunReport {
                posted: 0,
                pending: 3,
                fetched: true
            }
        );
        assert_eq!(h.announcements(), 3);

        let report = h.pipeline().run(true).await.unwrap();
        assert_eq!(report.pending, 3);
        assert_eq!(h.announcements(), 3, "drafts must not be re-announced");
        assert_eq!(h.draft_ids().len(), 3, "seen stories must not be redrafted");
    }

    #[tokio::test]
    async fn no_fetch_skips_sources() {
        let h = Harness::new(3, FakePublisher::ok());
        let report = h.pipeline().run(false).await.unwrap();
        assert_eq!(h.primary.calls(), 0);
        assert_eq!(h.secondary.calls(), 0);
        assert_eq!(report.pending, 0);
        assert!(!report.fetched);
        let monitoring = h.channel.sent_to(MONITOR);
        assert_eq!(monitoring.len(), 1);
        assert!(monitoring[0].ends_with("posted 0, pending 0 (no fetch)"));
    }

    #[tokio::test]
    async fn approve_publishes_and_reports() {
        let h = Harness::new(3, FakePublisher::ok());
        h.pipeline().run(true).await.unwrap();
        let id = h.draft_ids()[0].clone();

        h.channel.push_user_message("100", &format!("Approve {id}"));
        let report = h.pipeline().run(false).await.unwrap();
        assert_eq!(report.posted, 1);
        assert_eq!(report.pending, 2);

        let state = h.files.load().unwrap();
        let draft = state.drafts.find_by_id(&id).unwrap();
        assert_eq!(draft.status, DraftStatus::Posted);
        assert_eq!(draft.tweet_url.as_deref(), Some("https://x.com/i/web/status/901"));
        assert!(
            h.channel
                .sent_to(REVIEW)
                .contains(&format!("Posted {id}: https://x.com/i/web/status/901"))
        );
        let monitoring = h.channel.sent_to(MONITOR);
        assert!(monitoring.last().unwrap().contains("posted 1, pending 2 (no fetch)"));
        assert_eq!(h.publisher.texts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commands_are_not_reprocessed() {
        let h = Harness::new(1, FakePublisher::ok());
        h.pipeline().run(true).await.unwrap();
        let id = h.draft_ids()[0].clone();

        h.channel.push_user_message("200", &format!("approve {id}"));
        h.pipeline().run(false).await.unwrap();
        let report = h.pipeline().run(false).await.unwrap();

        assert_eq!(report.posted, 0);
        assert_eq!(h.publisher.texts.lock().unwrap().len(), 1);
        assert_eq!(h.files.load().unwrap().cursors.get(REVIEW), Some("200"));
    }

    #[tokio::test]
    async fn messages_at_or_before_cursor_are_skipped_when_channel_replays() {
        let mut h = Harness::new(2, FakePublisher::ok());
        h.channel = Arc::new(MemoryChannel {
            replay_history: true,
            ..MemoryChannel::new(REVIEW)
        });
        h.pipeline().run(true).await.unwrap();

        h.channel.push_user_message("10", "Reject all");
        h.pipeline().run(false).await.unwrap();
        h.pipeline().run(false).await.unwrap();

        let bulk = h
            .channel
            .sent_to(REVIEW)
            .iter()
            .filter(|m| m.starts_with("Processed Reject All"))
            .count();
        assert_eq!(bulk, 1, "a replayed command must be answered once");
        assert_eq!(h.files.load().unwrap().cursors.get(REVIEW), Some("10"));
    }

    #[tokio::test]
    async fn replies_for_refused_and_unknown_commands() {
        let h = Harness::new(2, FakePublisher::ok());
        h.pipeline().run(true).await.unwrap();
        let ids = h.draft_ids();

        h.channel.push_user_message("300", &format!("Reject {} off topic", ids[0]));
        h.channel.push_user_message("301", &format!("Approve {}", ids[0]));
        h.channel.push_user_message("302", "Approve nosuchdraft");
        h.channel.push_user_message("303", "good morning");
        h.channel.push_user_message("304", &format!("Revise {} GameStop  holds its meeting", ids[1]));
        h.pipeline().run(false).await.unwrap();

        let replies = h.channel.sent_to(REVIEW);
        assert!(replies.contains(&format!("Rejected {}. Reason saved.", ids[0])));
        assert!(replies.contains(&format!(
            "Draft {} is already rejected. Action skipped.",
            ids[0]
        )));
        assert!(replies.contains(&"Could not find draft nosuchdraft.".to_string()));
        assert!(replies.contains(&format!("Revised {}. It is still pending.", ids[1])));
        assert!(h.publisher.texts.lock().unwrap().is_empty());

        let state = h.files.load().unwrap();
        let revised = state.drafts.find_by_id(&ids[1]).unwrap();
        assert!(revised.summary.contains("GameStop holds its meeting."));
        assert_eq!(state.cursors.get(REVIEW), Some("304"));
    }

    #[tokio::test]
    async fn reject_all_rejects_every_pending() {
        let h = Harness::new(3, FakePublisher::ok());
        h.pipeline().run(true).await.unwrap();

        h.channel.push_user_message("400", "Reject all too noisy today");
        let report = h.pipeline().run(false).await.unwrap();

        assert_eq!(report.pending, 0);
        assert!(h.channel.sent_to(REVIEW).contains(
            &"Processed Reject All: marked 3 pending drafts as rejected. Reason: too noisy today"
                .to_string()
        ));
    }

    #[tokio::test]
    async fn bot_messages_are_ignored_but_advance_cursor() {
        let h = Harness::new(1, FakePublisher::ok());
        h.pipeline().run(true).await.unwrap();
        h.channel.inbox.lock().unwrap().push(ChannelMessage {
            id: "500".into(),
            content: "Reject all".into(),
            author_id: "someone-else".into(),
            author_is_bot: true,
        });
        h.channel.inbox.lock().unwrap().push(ChannelMessage {
            id: "501".into(),
            content: "Reject all".into(),
            author_id: "bot".into(),
            author_is_bot: false,
        });

        let report = h.pipeline().run(false).await.unwrap();
        assert_eq!(report.pending, 1);
        assert_eq!(h.files.load().unwrap().cursors.get(REVIEW), Some("501"));
    }

    #[tokio::test]
    async fn failed_publish_aborts_and_leaves_draft_pending() {
        let h = Harness::new(1, FakePublisher::failing());
        h.pipeline().run(true).await.unwrap();
        let id = h.draft_ids()[0].clone();

        h.channel.push_user_message("600", &format!("Approve {id}"));
        let err = h.pipeline().run(false).await.unwrap_err();
        assert!(matches!(err, Error::Publish(PublishError::Status { status: 403, .. })));

        let state = h.files.load().unwrap();
        assert_eq!(state.drafts.find_by_id(&id).unwrap().status, DraftStatus::Pending);
        assert_eq!(state.cursors.get(REVIEW), None);
    }

    #[tokio::test]
    async fn report_failure_posts_alert_with_hint() {
        let h = Harness::new(0, FakePublisher::ok());
        h.pipeline()
            .report_failure("Post rejected with 429: Too Many Requests")
            .await;
        let sent = h.channel.sent_to(MONITOR);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("– error: Post rejected with 429"));
        assert!(sent[0].contains("retry later"));
    }

    #[test]
    fn announcement_lists_id_summary_and_commands() {
        let draft = Draft::from_group("GameStop news https://a", &["https://a".into()], Utc::now());
        let text = announcement(&draft);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(format!("Draft {}", draft.id).as_str()));
        assert_eq!(lines.next(), Some("> GameStop news https://a"));
        assert!(lines.next().unwrap().starts_with("Commands: "));
    }
}
