// ProcessedCursor — which notifications are done, persisted across restarts.
//
// Two parts: a watermark timestamp (every notification strictly older is
// done) and the set of handled ids at or above it. The watermark only moves
// over a contiguous run of resolved notifications, so an unresolved one
// keeps everything from its timestamp onward visible to the poller. Handled
// ids that fall below the watermark are pruned; the watermark covers them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::db::models::{decode_timestamp, encode_timestamp, HandledOutcome, LAST_POLL_KEY, WATERMARK_KEY};
use crate::db::StateStore;
use crate::models::Notification;

pub struct ProcessedCursor {
    store: Arc<dyn StateStore>,
    watermark: DateTime<Utc>,
    handled: HashSet<String>,
    /// Attempt counts as this process has seen them. Covers the store being
    /// unwritable so the retry cap still applies.
    local_attempts: Mutex<HashMap<String, u32>>,
}

impl ProcessedCursor {
    /// Resume from the store. With no stored watermark, start at `now` so a
    /// fresh deployment doesn't answer old mentions.
    pub async fn load(store: Arc<dyn StateStore>, now: DateTime<Utc>) -> Result<Self> {
        let stored = store
            .get_state(WATERMARK_KEY)
            .await
            .context("Failed to read notification watermark")?;

        let watermark = match stored.as_deref().map(|s| (s, decode_timestamp(s))) {
            Some((_, Some(ts))) => ts,
            Some((raw, None)) => {
                anyhow::bail!("Stored notification watermark is not a timestamp: {raw:?}")
            }
            None => {
                store
                    .set_state(WATERMARK_KEY, &encode_timestamp(&now))
                    .await
                    .context("Failed to initialize notification watermark")?;
                info!(watermark = %encode_timestamp(&now), "No saved cursor, starting from now");
                now
            }
        };

        let handled = store
            .handled_since(&watermark)
            .await
            .context("Failed to load handled notifications")?
            .into_iter()
            .map(|r| r.id)
            .collect::<HashSet<_>>();

        debug!(
            watermark = %encode_timestamp(&watermark),
            handled = handled.len(),
            "Loaded processed cursor"
        );

        Ok(Self {
            store,
            watermark,
            handled,
            local_attempts: Mutex::new(HashMap::new()),
        })
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn is_handled(&self, id: &str) -> bool {
        self.handled.contains(id)
    }

    /// Handled ids still tracked above the watermark.
    pub fn handled_len(&self) -> usize {
        self.handled.len()
    }

    /// Whether the poller should still consider a notification from `ts`.
    pub fn is_visible(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.watermark
    }

    /// Mark `notification` resolved. When `advance` is set (everything older
    /// in this batch is resolved too) the watermark moves up to it.
    ///
    /// Returns whether the watermark moved.
    pub async fn commit(
        &mut self,
        notification: &Notification,
        outcome: HandledOutcome,
        advance: bool,
    ) -> Result<bool> {
        // In-memory first: even if persisting fails, this process won't
        // handle the notification again.
        self.handled.insert(notification.id.clone());
        self.local_attempts
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&notification.id);
        self.store
            .mark_handled(&notification.id, &notification.created_at, outcome)
            .await
            .with_context(|| format!("Failed to record notification {}", notification.id))?;

        if !advance || notification.created_at <= self.watermark {
            return Ok(false);
        }

        let new_watermark = notification.created_at;
        self.store
            .set_state(WATERMARK_KEY, &encode_timestamp(&new_watermark))
            .await
            .context("Failed to save notification watermark")?;
        self.watermark = new_watermark;

        let pruned = self
            .store
            .prune_handled_before(&new_watermark)
            .await
            .context("Failed to prune handled notifications")?;
        let store_ids: HashSet<String> = self
            .store
            .handled_since(&new_watermark)
            .await
            .context("Failed to reload handled notifications")?
            .into_iter()
            .map(|r| r.id)
            .collect();
        self.handled.retain(|id| store_ids.contains(id));

        debug!(
            watermark = %encode_timestamp(&new_watermark),
            pruned = pruned,
            "Advanced notification watermark"
        );
        Ok(true)
    }

    /// Count a failed attempt for `id`; returns attempts so far. Never
    /// fails: if the store can't record it, the count is kept in memory.
    pub async fn record_failure(&self, id: &str, error: &str) -> u32 {
        let stored = self.store.record_attempt(id, error).await;

        let mut local = self
            .local_attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let count = local.entry(id.to_string()).or_default();
        match stored {
            Ok(n) => *count = (*count).max(n),
            Err(e) => {
                *count += 1;
                warn!(notification = id, error = %e, attempts = *count, "Failed to persist attempt, counting in memory");
            }
        }
        *count
    }

    pub async fn attempts(&self, id: &str) -> Result<u32> {
        self.store.attempts(id).await
    }

    pub async fn record_poll(&self, at: DateTime<Utc>) -> Result<()> {
        self.store
            .set_state(LAST_POLL_KEY, &encode_timestamp(&at))
            .await
    }
}
