// The engagement analyzer.
//
// Given a history, select:
// - top_recent: best engagement inside [now - window, now]
// - top_all_time: best engagement over the whole history
// - most_controversial: best reply/like ratio among posts with enough replies

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};

use super::ranking::{by_controversy, by_engagement};
use crate::models::{AnalysisResult, Post};

/// Tunables for the analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// Length of the "recent" window (default 30 days).
    pub recent_window: TimeDelta,
    /// A post needs at least this many replies to be ranked by controversy
    /// (default 5). Keeps one-reply posts from dominating the ratio.
    pub min_replies_for_ratio: u64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            recent_window: TimeDelta::days(30),
            min_replies_for_ratio: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngagementAnalyzer {
    settings: AnalyzerSettings,
}

impl EngagementAnalyzer {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyze a history. Empty input yields an empty result.
    pub fn analyze(&self, posts: &[Post], now: DateTime<Utc>) -> AnalysisResult {
        let unique = dedup_by_uri(posts);
        // A window reaching past the earliest representable time covers everything
        let window_start = now
            .checked_sub_signed(self.settings.recent_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let top_recent = unique
            .iter()
            .copied()
            .filter(|p| p.created_at >= window_start && p.created_at <= now)
            .max_by(|a, b| by_engagement(a, b))
            .cloned();

        let top_all_time = unique
            .iter()
            .copied()
            .max_by(|a, b| by_engagement(a, b))
            .cloned();

        let most_controversial = unique
            .iter()
            .copied()
            .filter(|p| p.reply_count >= self.settings.min_replies_for_ratio)
            .max_by(|a, b| by_controversy(a, b))
            .cloned();

        AnalysisResult {
            top_recent,
            top_all_time,
            most_controversial,
        }
    }
}

/// Keep the first occurrence of each uri, preserving input order.
fn dedup_by_uri(posts: &[Post]) -> Vec<&Post> {
    let mut seen = HashSet::with_capacity(posts.len());
    posts
        .iter()
        .filter(|p| seen.insert(p.uri.as_str()))
        .collect()
}
