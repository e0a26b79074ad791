// SqliteStore — rusqlite backend implementing the StateStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// No network call ever happens while the lock is held.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{CursorSummary, HandledOutcome, HandledRecord};
use super::queries;
use super::traits::StateStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        queries::get_state(&conn, key)
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::set_state(&conn, key, value)
    }

    async fn mark_handled(
        &self,
        id: &str,
        indexed_at: &DateTime<Utc>,
        outcome: HandledOutcome,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::mark_handled(&conn, id, indexed_at, outcome)
    }

    async fn handled_since(&self, since: &DateTime<Utc>) -> Result<Vec<HandledRecord>> {
        let conn = self.conn.lock().await;
        queries::handled_since(&conn, since)
    }

    async fn prune_handled_before(&self, before: &DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().await;
        queries::prune_handled_before(&conn, before)
    }

    async fn record_attempt(&self, id: &str, error: &str) -> Result<u32> {
        let conn = self.conn.lock().await;
        queries::record_attempt(&conn, id, error)
    }

    async fn attempts(&self, id: &str) -> Result<u32> {
        let conn = self.conn.lock().await;
        queries::attempts(&conn, id)
    }

    async fn summary(&self) -> Result<CursorSummary> {
        let conn = self.conn.lock().await;
        queries::summary(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::WATERMARK_KEY;
    use crate::db::schema::create_tables;
    use chrono::TimeZone;

    fn store() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        SqliteStore::new(conn)
    }

    #[tokio::test]
    async fn trait_methods_delegate_to_queries() {
        let store = store();
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();

        store.set_state(WATERMARK_KEY, "x").await.unwrap();
        assert_eq!(store.get_state(WATERMARK_KEY).await.unwrap().as_deref(), Some("x"));

        assert_eq!(store.record_attempt("at://n1", "timeout").await.unwrap(), 1);
        store
            .mark_handled("at://n1", &ts, HandledOutcome::Replied)
            .await
            .unwrap();
        assert_eq!(store.attempts("at://n1").await.unwrap(), 0);

        let handled = store.handled_since(&ts).await.unwrap();
        assert_eq!(handled.len(), 1);
        assert_eq!(handled[0].outcome, HandledOutcome::Replied);

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.handled, 1);
        assert_eq!(summary.pending_retries, 0);
    }
}
