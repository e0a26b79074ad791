// Notification poller — one pass over the notification stream.
//
// Walks pages newest-first until it reaches the cursor's watermark, drops
// anything already handled (and duplicates from overlapping pages), and
// returns the rest oldest-first. A fetch failure on any page fails the whole
// poll; nothing is returned partially so the cursor can't skip ahead.
//
// A backlog deeper than the page cap is drained over several polls: the
// poller keeps the page cursor where it stopped and resumes there next time.
// Until the walk reaches the watermark the batch is marked truncated and the
// watermark must not move.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::cursor::ProcessedCursor;
use crate::bluesky::SocialClient;
use crate::error::SocialError;
use crate::models::Notification;

/// Safety bound on pages with unseen notifications walked per poll (50
/// notifications each).
pub const DEFAULT_MAX_PAGES: usize = 20;

/// Pages holding only already-handled notifications are cheaper to skip
/// through; they're bounded by this multiple of the page cap instead.
const HANDLED_PAGE_FACTOR: usize = 10;

/// A notification the pipeline has not seen yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Polled {
    /// Needs the full pipeline.
    Mention(Notification),
    /// Acknowledged without processing.
    Ignored(Notification),
}

impl Polled {
    pub fn notification(&self) -> &Notification {
        match self {
            Polled::Mention(n) | Polled::Ignored(n) => n,
        }
    }
}

/// One poll's worth of unseen notifications, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PollBatch {
    pub items: Vec<Polled>,
    /// Older unseen notifications remain beyond this batch.
    pub truncated: bool,
}

pub struct NotificationPoller {
    client: Arc<dyn SocialClient>,
    max_pages: usize,
    /// Where the last capped walk stopped.
    backlog: Option<String>,
    /// Malformed entries already reported at error level.
    reported: HashSet<String>,
}

impl NotificationPoller {
    pub fn new(client: Arc<dyn SocialClient>, max_pages: usize) -> Self {
        Self {
            client,
            max_pages: max_pages.max(1),
            backlog: None,
            reported: HashSet::new(),
        }
    }

    /// Whether a capped walk is still being drained.
    pub fn has_backlog(&self) -> bool {
        self.backlog.is_some()
    }

    /// Unseen notifications since the cursor, oldest first.
    pub async fn poll(&mut self, cursor: &ProcessedCursor) -> Result<PollBatch, SocialError> {
        let mut fresh: Vec<Notification> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        // Taken, not cloned: if this walk fails, the next one restarts from
        // the top rather than retrying a possibly stale cursor.
        let resuming = self.backlog.is_some();
        let mut page_cursor: Option<String> = self.backlog.take();
        let mut pages = 0;
        let mut fresh_pages = 0;
        let mut truncated = false;

        loop {
            let page = self
                .client
                .list_notifications(page_cursor.as_deref())
                .await?;
            pages += 1;

            for rejected in page.rejected {
                let key = rejected.id.clone().unwrap_or_else(|| rejected.error.clone());
                if self.reported.insert(key) {
                    error!(
                        notification = rejected.id.as_deref().unwrap_or("<no uri>"),
                        error = %rejected.error,
                        "Skipping malformed notification"
                    );
                }
            }

            let mut reached_watermark = false;
            let before = fresh.len();
            for n in page.notifications {
                if !cursor.is_visible(&n.created_at) {
                    reached_watermark = true;
                    continue;
                }
                if cursor.is_handled(&n.id) || !seen.insert(n.id.clone()) {
                    continue;
                }
                fresh.push(n);
            }

            if fresh.len() > before {
                fresh_pages += 1;
            }

            page_cursor = page.cursor;
            if reached_watermark || page_cursor.is_none() {
                break;
            }
            if fresh_pages >= self.max_pages
                || pages >= self.max_pages.saturating_mul(HANDLED_PAGE_FACTOR)
            {
                truncated = true;
                break;
            }
        }

        if truncated {
            warn!(
                pages = pages,
                collected = fresh.len(),
                "Notification backlog exceeds page limit, continuing next poll"
            );
            self.backlog = page_cursor;
        } else if resuming {
            info!("Notification backlog drained");
        }

        fresh.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        debug!(pages = pages, unseen = fresh.len(), "Polled notifications");

        let items = fresh
            .into_iter()
            .map(|n| {
                if n.is_mention() {
                    Polled::Mention(n)
                } else {
                    Polled::Ignored(n)
                }
            })
            .collect();
        Ok(PollBatch { items, truncated })
    }
}
