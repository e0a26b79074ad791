// Bot status — the live progress signal and the `status` command.
//
// BotHealth is written by the orchestrator and read by the health endpoint.
// `show` prints the persisted cursor for operators.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::db::{self, StateStore};
use crate::output::terminal;

/// Live progress of the poll loop, exposed via GET /health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// True while the poll loop is running.
    pub running: bool,
    pub started_at: DateTime<Utc>,
    /// When a poll last completed without error.
    pub last_successful_poll: Option<DateTime<Utc>>,
    pub consecutive_poll_failures: u32,
    pub mentions_replied: u64,
    pub mentions_failed: u64,
    pub last_error: Option<String>,
}

/// Shared handle to the progress signal.
#[derive(Debug, Clone)]
pub struct BotHealth {
    inner: Arc<RwLock<HealthStatus>>,
}

impl Default for BotHealth {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl BotHealth {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthStatus {
                running: false,
                started_at,
                last_successful_poll: None,
                consecutive_poll_failures: 0,
                mentions_replied: 0,
                mentions_failed: 0,
                last_error: None,
            })),
        }
    }

    pub async fn snapshot(&self) -> HealthStatus {
        self.inner.read().await.clone()
    }

    pub async fn set_running(&self, running: bool) {
        self.inner.write().await.running = running;
    }

    pub async fn poll_succeeded(&self, at: DateTime<Utc>) {
        let mut status = self.inner.write().await;
        status.last_successful_poll = Some(at);
        status.consecutive_poll_failures = 0;
    }

    pub async fn poll_failed(&self, error: &str) {
        let mut status = self.inner.write().await;
        status.consecutive_poll_failures = status.consecutive_poll_failures.saturating_add(1);
        status.last_error = Some(error.to_string());
    }

    pub async fn mention_replied(&self) {
        self.inner.write().await.mentions_replied += 1;
    }

    pub async fn mention_failed(&self, error: &str) {
        let mut status = self.inner.write().await;
        status.mentions_failed += 1;
        status.last_error = Some(error.to_string());
    }
}

/// Render a timestamp the way the health endpoint and CLI show it.
pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Display persisted bot state to the terminal. Never creates the database.
pub async fn show(db_display_path: &str) -> Result<()> {
    if !Path::new(db_display_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `tallybot run` once to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let store = db::open_store(db_display_path)?;
    let summary = store.summary().await?;
    terminal::display_cursor(&summary);
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
