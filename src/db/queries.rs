// Database queries — every SQL statement the bot runs lives here.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{
    decode_timestamp, encode_timestamp, CursorSummary, HandledOutcome, HandledRecord,
    LAST_POLL_KEY, WATERMARK_KEY,
};

// --- Bot state ---

/// Get a bot state value by key (e.g., "notifications_watermark").
pub fn get_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM bot_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a bot state value (upsert).
pub fn set_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO bot_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

// --- Handled notifications ---

/// Record a notification as handled and forget its failed attempts.
pub fn mark_handled(
    conn: &Connection,
    id: &str,
    indexed_at: &DateTime<Utc>,
    outcome: HandledOutcome,
) -> Result<()> {
    conn.execute(
        "INSERT INTO handled_notifications (id, indexed_at, outcome, handled_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(id) DO UPDATE SET outcome = ?3, handled_at = datetime('now')",
        params![id, encode_timestamp(indexed_at), outcome.as_str()],
    )?;
    conn.execute(
        "DELETE FROM notification_attempts WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// All handled notifications indexed at or after `since`.
pub fn handled_since(conn: &Connection, since: &DateTime<Utc>) -> Result<Vec<HandledRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, indexed_at, outcome FROM handled_notifications
         WHERE indexed_at >= ?1
         ORDER BY indexed_at ASC",
    )?;

    let rows = stmt.query_map(params![encode_timestamp(since)], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, indexed_at, outcome) = row?;
        let indexed_at = decode_timestamp(&indexed_at)
            .with_context(|| format!("Corrupt indexed_at for handled notification {id}"))?;
        let outcome = HandledOutcome::parse(&outcome)
            .with_context(|| format!("Unknown outcome '{outcome}' for handled notification {id}"))?;
        records.push(HandledRecord {
            id,
            indexed_at,
            outcome,
        });
    }
    Ok(records)
}

/// Drop handled rows strictly older than `before`. Returns rows removed.
pub fn prune_handled_before(conn: &Connection, before: &DateTime<Utc>) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM handled_notifications WHERE indexed_at < ?1",
        params![encode_timestamp(before)],
    )?;
    Ok(removed)
}

// --- Attempts ---

/// Increment the failed-attempt counter for a notification and return the new count.
pub fn record_attempt(conn: &Connection, id: &str, error: &str) -> Result<u32> {
    conn.execute(
        "INSERT INTO notification_attempts (id, attempts, last_error, updated_at)
         VALUES (?1, 1, ?2, datetime('now'))
         ON CONFLICT(id) DO UPDATE SET
            attempts = attempts + 1,
            last_error = ?2,
            updated_at = datetime('now')",
        params![id, error],
    )?;
    attempts(conn, id)
}

/// Failed attempts recorded so far for a notification (0 if none).
pub fn attempts(conn: &Connection, id: &str) -> Result<u32> {
    let count: Option<u32> = conn
        .query_row(
            "SELECT attempts FROM notification_attempts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count.unwrap_or(0))
}

// --- Status ---

pub fn summary(conn: &Connection) -> Result<CursorSummary> {
    let handled: i64 = conn.query_row(
        "SELECT COUNT(*) FROM handled_notifications",
        [],
        |row| row.get(0),
    )?;
    let pending: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notification_attempts",
        [],
        |row| row.get(0),
    )?;

    Ok(CursorSummary {
        watermark: get_state(conn, WATERMARK_KEY)?,
        handled: handled.max(0) as u64,
        pending_retries: pending.max(0) as u64,
        last_poll_at: get_state(conn, LAST_POLL_KEY)?,
    })
}
