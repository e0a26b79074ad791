// MemoryStore — in-process StateStore with the same semantics as SQLite.
//
// Used by tests and by anything that wants the pipeline without a database
// file. Clones share the same underlying state, which is how tests simulate
// a restart against persisted state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{CursorSummary, HandledOutcome, HandledRecord, LAST_POLL_KEY, WATERMARK_KEY};
use super::traits::StateStore;

#[derive(Default)]
struct Inner {
    state: HashMap<String, String>,
    handled: HashMap<String, HandledRecord>,
    attempts: HashMap<String, u32>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_state(&self, key: &str) -> Result<Option<String>> {
        Ok(self.with(|i| i.state.get(key).cloned()))
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        self.with(|i| i.state.insert(key.to_string(), value.to_string()));
        Ok(())
    }

    async fn mark_handled(
        &self,
        id: &str,
        indexed_at: &DateTime<Utc>,
        outcome: HandledOutcome,
    ) -> Result<()> {
        self.with(|i| {
            i.attempts.remove(id);
            i.handled.insert(
                id.to_string(),
                HandledRecord {
                    id: id.to_string(),
                    indexed_at: *indexed_at,
                    outcome,
                },
            );
        });
        Ok(())
    }

    async fn handled_since(&self, since: &DateTime<Utc>) -> Result<Vec<HandledRecord>> {
        let mut records: Vec<HandledRecord> = self.with(|i| {
            i.handled
                .values()
                .filter(|r| r.indexed_at >= *since)
                .cloned()
                .collect()
        });
        records.sort_by(|a, b| a.indexed_at.cmp(&b.indexed_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn prune_handled_before(&self, before: &DateTime<Utc>) -> Result<usize> {
        Ok(self.with(|i| {
            let len = i.handled.len();
            i.handled.retain(|_, r| r.indexed_at >= *before);
            len - i.handled.len()
        }))
    }

    async fn record_attempt(&self, id: &str, _error: &str) -> Result<u32> {
        Ok(self.with(|i| {
            let count = i.attempts.entry(id.to_string()).or_insert(0);
            *count += 1;
            *count
        }))
    }

    async fn attempts(&self, id: &str) -> Result<u32> {
        Ok(self.with(|i| i.attempts.get(id).copied().unwrap_or(0)))
    }

    async fn summary(&self) -> Result<CursorSummary> {
        Ok(self.with(|i| CursorSummary {
            watermark: i.state.get(WATERMARK_KEY).cloned(),
            handled: i.handled.len() as u64,
            pending_retries: i.attempts.len() as u64,
            last_poll_at: i.state.get(LAST_POLL_KEY).cloned(),
        }))
    }
}
