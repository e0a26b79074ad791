// Bot orchestrator — poll, then take each mention through the pipeline.
//
// Per mention: RECEIVED -> HISTORY_FETCHED -> ANALYZED -> REPLIED -> COMMITTED,
// or FAILED from any of them. Mentions are processed one at a time, oldest
// first. Transient failures leave the notification uncommitted (retried next
// cycle) until the per-notification retry budget runs out; permanent and
// malformed failures are committed as failed right away so they can't wedge
// the cursor.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::{retry_transient, BackoffPolicy};
use super::cursor::ProcessedCursor;
use super::history::fetch_history;
use super::poller::{NotificationPoller, Polled, DEFAULT_MAX_PAGES};
use crate::analytics::EngagementAnalyzer;
use crate::bluesky::SocialClient;
use crate::db::models::HandledOutcome;
use crate::error::SocialError;
use crate::models::{Notification, PostRef};
use crate::output::ReplyComposer;
use crate::status::BotHealth;

/// Where a mention is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionState {
    Received,
    HistoryFetched,
    Analyzed,
    Replied,
    Committed,
    Failed,
}

impl fmt::Display for MentionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MentionState::Received => "RECEIVED",
            MentionState::HistoryFetched => "HISTORY_FETCHED",
            MentionState::Analyzed => "ANALYZED",
            MentionState::Replied => "REPLIED",
            MentionState::Committed => "COMMITTED",
            MentionState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// How processing one mention ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionOutcome {
    /// Resolved; commit with this outcome.
    Resolved(HandledOutcome),
    /// Transient failure within the retry budget; leave uncommitted.
    Deferred { attempts: u32 },
    /// Shutdown arrived mid-flight; leave uncommitted.
    Abandoned,
}

/// Counts for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub polled: usize,
    pub replied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deferred: usize,
    pub abandoned: usize,
    pub watermark_advanced: bool,
    /// Older notifications are still waiting beyond the page limit.
    pub truncated: bool,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.polled == 0 && !self.truncated
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub poll_interval: Duration,
    /// Cap for the delay between failed polls.
    pub max_poll_backoff: Duration,
    /// History bound per mention (feed entries read).
    pub max_posts: usize,
    /// Processing attempts per notification before giving up.
    pub max_retries: u32,
    /// Only answer accounts that follow the bot.
    pub require_follow: bool,
    /// Per-request retries within a single attempt.
    pub call_policy: BackoffPolicy,
    pub max_notification_pages: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_poll_backoff: Duration::from_secs(300),
            max_posts: 1000,
            max_retries: 5,
            require_follow: false,
            call_policy: BackoffPolicy::default(),
            max_notification_pages: DEFAULT_MAX_PAGES,
        }
    }
}

pub struct BotOrchestrator {
    client: Arc<dyn SocialClient>,
    cursor: ProcessedCursor,
    poller: NotificationPoller,
    analyzer: EngagementAnalyzer,
    composer: ReplyComposer,
    settings: OrchestratorSettings,
    health: BotHealth,
}

impl BotOrchestrator {
    pub fn new(
        client: Arc<dyn SocialClient>,
        cursor: ProcessedCursor,
        analyzer: EngagementAnalyzer,
        composer: ReplyComposer,
        settings: OrchestratorSettings,
        health: BotHealth,
    ) -> Self {
        let poller = NotificationPoller::new(Arc::clone(&client), settings.max_notification_pages);
        Self {
            client,
            cursor,
            poller,
            analyzer,
            composer,
            settings,
            health,
        }
    }

    pub fn cursor(&self) -> &ProcessedCursor {
        &self.cursor
    }

    pub fn health(&self) -> &BotHealth {
        &self.health
    }

    /// Poll forever until `shutdown` fires. Poll failures back off
    /// exponentially up to `max_poll_backoff`; nothing here ends the loop
    /// except cancellation.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let poll_backoff = BackoffPolicy::new(
            self.settings.poll_interval,
            self.settings.max_poll_backoff,
            u32::MAX,
        );
        let mut failures = 0u32;

        self.health.set_running(true).await;
        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            "Poll loop started"
        );

        while !shutdown.is_cancelled() {
            let delay = match self.run_cycle(&shutdown).await {
                Ok(report) => {
                    failures = 0;
                    if !report.is_idle() {
                        info!(
                            polled = report.polled,
                            replied = report.replied,
                            skipped = report.skipped,
                            failed = report.failed,
                            deferred = report.deferred,
                            "Poll cycle complete"
                        );
                    }
                    self.settings.poll_interval
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    self.health.poll_failed(&e.to_string()).await;
                    let delay = poll_backoff.delay_after(failures, &e);
                    match e {
                        SocialError::Transient { .. } => warn!(
                            error = %e,
                            consecutive = failures,
                            retry_in_secs = delay.as_secs(),
                            "Notification poll failed"
                        ),
                        _ => error!(
                            error = %e,
                            kind = e.kind(),
                            consecutive = failures,
                            retry_in_secs = delay.as_secs(),
                            "Notification poll failed"
                        ),
                    }
                    delay
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.health.set_running(false).await;
        info!("Poll loop stopped");
    }

    /// One poll plus processing of everything it returned.
    pub async fn run_cycle(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<CycleReport, SocialError> {
        let batch = self.poller.poll(&self.cursor).await?;

        let now = Utc::now();
        self.health.poll_succeeded(now).await;
        if let Err(e) = self.cursor.record_poll(now).await {
            warn!(error = %e, "Failed to persist last poll time");
        }

        let mut report = CycleReport {
            polled: batch.items.len(),
            truncated: batch.truncated,
            ..Default::default()
        };
        // Set once anything in this batch is left unresolved; from then on
        // resolved notifications are recorded but the watermark stays put.
        // A truncated batch has unseen notifications below it, so it starts
        // blocked.
        let mut blocked = batch.truncated;

        for item in batch.items {
            if shutdown.is_cancelled() {
                report.abandoned += 1;
                blocked = true;
                continue;
            }

            let outcome = match &item {
                Polled::Ignored(n) => {
                    debug!(notification = %n.id, reason = %n.reason, "Acknowledging non-mention");
                    MentionOutcome::Resolved(HandledOutcome::Skipped)
                }
                Polled::Mention(n) => self.process_mention(n, shutdown).await,
            };

            let n = item.notification();
            match outcome {
                MentionOutcome::Resolved(handled) => {
                    match handled {
                        HandledOutcome::Replied => report.replied += 1,
                        HandledOutcome::Skipped => report.skipped += 1,
                        HandledOutcome::Failed => report.failed += 1,
                    }
                    match self.cursor.commit(n, handled, !blocked).await {
                        Ok(moved) => report.watermark_advanced |= moved,
                        Err(e) => {
                            error!(notification = %n.id, error = %e, "Failed to persist cursor");
                            blocked = true;
                        }
                    }
                }
                MentionOutcome::Deferred { attempts } => {
                    debug!(notification = %n.id, attempts = attempts, "Left for next cycle");
                    report.deferred += 1;
                    blocked = true;
                }
                MentionOutcome::Abandoned => {
                    report.abandoned += 1;
                    blocked = true;
                }
            }
        }

        if report.abandoned > 0 {
            info!(abandoned = report.abandoned, "Shutdown requested, left mentions for next run");
        }

        if report.watermark_advanced {
            if let Err(e) = self.client.update_seen(self.cursor.watermark()).await {
                debug!(error = %e, "updateSeen failed (ignored)");
            }
        }

        Ok(report)
    }

    /// Take one mention through the pipeline and settle its failure, if any.
    pub async fn process_mention(
        &self,
        notification: &Notification,
        shutdown: &CancellationToken,
    ) -> MentionOutcome {
        info!(
            notification = %notification.id,
            author = %notification.author_handle,
            "Processing mention"
        );

        let mut state = MentionState::Received;
        let result = self.drive(notification, &mut state, shutdown).await;

        match result {
            Ok(Some(outcome)) => {
                transition(notification, &mut state, MentionState::Committed);
                if outcome == HandledOutcome::Replied {
                    self.health.mention_replied().await;
                }
                MentionOutcome::Resolved(outcome)
            }
            Ok(None) => {
                info!(notification = %notification.id, stage = %state, "Abandoned on shutdown");
                MentionOutcome::Abandoned
            }
            Err(e) => self.settle_failure(notification, state, e).await,
        }
    }

    /// The happy path. `Ok(None)` means shutdown interrupted the history fetch.
    async fn drive(
        &self,
        notification: &Notification,
        state: &mut MentionState,
        shutdown: &CancellationToken,
    ) -> Result<Option<HandledOutcome>, SocialError> {
        let actor = notification.author_did.as_str();
        let handle = notification.author_handle.as_str();
        let policy = &self.settings.call_policy;

        if self.settings.require_follow {
            let follows = retry_transient(policy, "getProfile", || {
                self.client.is_followed_by(actor)
            })
            .await?;
            if !follows {
                info!(author = handle, "Mention from non-follower, sending follow prompt");
                let prompt = self.composer.follow_prompt(handle);
                self.post_thread(notification, &[prompt]).await?;
                transition(notification, state, MentionState::Replied);
                return Ok(Some(HandledOutcome::Replied));
            }
        }

        let posts = tokio::select! {
            _ = shutdown.cancelled() => return Ok(None),
            r = fetch_history(self.client.as_ref(), actor, self.settings.max_posts, policy) => r?,
        };
        transition(notification, state, MentionState::HistoryFetched);

        let result = self.analyzer.analyze(&posts, Utc::now());
        transition(notification, state, MentionState::Analyzed);
        debug!(
            notification = %notification.id,
            posts = posts.len(),
            top_recent = result.top_recent.as_ref().map(|p| p.uri.as_str()),
            top_all_time = result.top_all_time.as_ref().map(|p| p.uri.as_str()),
            most_controversial = result.most_controversial.as_ref().map(|p| p.uri.as_str()),
            "Analysis complete"
        );

        let segments = self.composer.compose(&result, handle);
        self.post_thread(notification, &segments).await?;
        transition(notification, state, MentionState::Replied);

        info!(
            notification = %notification.id,
            author = handle,
            segments = segments.len(),
            "Replied with engagement stats"
        );
        Ok(Some(HandledOutcome::Replied))
    }

    /// Post `segments` as a chain under the mention. Each segment waits for
    /// the previous one's reference before being posted as its child.
    async fn post_thread(
        &self,
        notification: &Notification,
        segments: &[String],
    ) -> Result<Vec<PostRef>, SocialError> {
        let root = &notification.thread_root;
        let mut parent = notification.post.clone();
        let mut posted = Vec::with_capacity(segments.len());

        for (i, text) in segments.iter().enumerate() {
            let new_post = retry_transient(&self.settings.call_policy, "createRecord", || {
                self.client.post_reply(&parent, root, text)
            })
            .await
            .inspect_err(|e| {
                if i > 0 {
                    warn!(
                        notification = %notification.id,
                        posted = i,
                        total = segments.len(),
                        error = %e,
                        "Reply thread left partial"
                    );
                }
            })?;
            debug!(notification = %notification.id, segment = i + 1, uri = %new_post.uri, "Posted segment");
            parent = new_post.clone();
            posted.push(new_post);
        }

        Ok(posted)
    }

    async fn settle_failure(
        &self,
        notification: &Notification,
        mut state: MentionState,
        err: SocialError,
    ) -> MentionOutcome {
        let stage = state;
        transition(notification, &mut state, MentionState::Failed);

        match &err {
            SocialError::Malformed(_) => {
                error!(
                    notification = %notification.id,
                    author = %notification.author_handle,
                    stage = %stage,
                    error = %err,
                    "Malformed data, giving up on mention"
                );
            }
            SocialError::Permanent(_) => {
                warn!(
                    notification = %notification.id,
                    author = %notification.author_handle,
                    stage = %stage,
                    error = %err,
                    "Permanent failure, giving up on mention"
                );
            }
            SocialError::Transient { .. } => {
                let attempts = self
                    .cursor
                    .record_failure(&notification.id, &err.to_string())
                    .await;

                if attempts < self.settings.max_retries {
                    warn!(
                        notification = %notification.id,
                        stage = %stage,
                        attempt = attempts,
                        max = self.settings.max_retries,
                        error = %err,
                        "Transient failure, will retry next cycle"
                    );
                    return MentionOutcome::Deferred { attempts };
                }

                warn!(
                    notification = %notification.id,
                    author = %notification.author_handle,
                    attempts = attempts,
                    error = %err,
                    "Retry budget exhausted, giving up on mention"
                );
            }
        }

        self.health.mention_failed(&err.to_string()).await;
        MentionOutcome::Resolved(HandledOutcome::Failed)
    }
}

fn transition(notification: &Notification, state: &mut MentionState, next: MentionState) {
    debug!(notification = %notification.id, from = %state, to = %next, "Mention state");
    *state = next;
}
