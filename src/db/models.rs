// Data models for persisted bot state.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Key in `bot_state` holding the notification watermark.
pub const WATERMARK_KEY: &str = "notifications_watermark";

/// Key in `bot_state` holding the time of the last successful poll.
pub const LAST_POLL_KEY: &str = "last_poll_at";

/// How a handled notification was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandledOutcome {
    /// A reply thread was posted.
    Replied,
    /// Not a mention; acknowledged without processing.
    Skipped,
    /// Permanently unprocessable (permanent error, malformed data, or retry
    /// budget exhausted). No reply was sent.
    Failed,
}

impl HandledOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandledOutcome::Replied => "replied",
            HandledOutcome::Skipped => "skipped",
            HandledOutcome::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "replied" => Some(HandledOutcome::Replied),
            "skipped" => Some(HandledOutcome::Skipped),
            "failed" => Some(HandledOutcome::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for HandledOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of `handled_notifications`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledRecord {
    pub id: String,
    pub indexed_at: DateTime<Utc>,
    pub outcome: HandledOutcome,
}

/// Snapshot for the `status` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorSummary {
    pub watermark: Option<String>,
    pub handled: u64,
    pub pending_retries: u64,
    pub last_poll_at: Option<String>,
}

/// Canonical timestamp encoding for storage. Fixed width, so stored values
/// sort lexicographically in time order.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
