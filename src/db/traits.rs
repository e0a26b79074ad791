// State store trait — backend-agnostic async interface for bot state.
//
// Implementors: SqliteStore (wraps rusqlite), MemoryStore (tests and dry
// runs). The pipeline only ever sees `Arc<dyn StateStore>`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{CursorSummary, HandledOutcome, HandledRecord};

#[async_trait]
pub trait StateStore: Send + Sync {
    // --- Key/value state ---

    /// Get a state value by key (e.g., "notifications_watermark").
    async fn get_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a state value (upsert).
    async fn set_state(&self, key: &str, value: &str) -> Result<()>;

    // --- Handled notifications ---

    /// Record a terminal outcome for a notification. Clears its attempt count.
    async fn mark_handled(
        &self,
        id: &str,
        indexed_at: &DateTime<Utc>,
        outcome: HandledOutcome,
    ) -> Result<()>;

    /// Handled notifications indexed at or after `since`, oldest first.
    async fn handled_since(&self, since: &DateTime<Utc>) -> Result<Vec<HandledRecord>>;

    /// Forget handled notifications indexed strictly before `before`.
    async fn prune_handled_before(&self, before: &DateTime<Utc>) -> Result<usize>;

    // --- Retry accounting ---

    /// Count one more failed attempt and return the total so far.
    async fn record_attempt(&self, id: &str, error: &str) -> Result<u32>;

    /// Failed attempts so far (0 if none).
    async fn attempts(&self, id: &str) -> Result<u32>;

    // --- Status ---

    async fn summary(&self) -> Result<CursorSummary>;
}
