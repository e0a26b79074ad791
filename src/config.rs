use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::TimeDelta;

use crate::analytics::AnalyzerSettings;
use crate::bluesky::client::DEFAULT_PDS_URL;
use crate::output::reply::{ComposerSettings, MAX_POST_CHARS, MAX_PREVIEW_CHARS};
use crate::pipeline::{BackoffPolicy, OrchestratorSettings};
use crate::pipeline::poller::DEFAULT_MAX_PAGES;

/// Longest recent window accepted (about a century).
pub const MAX_RECENT_DAYS: i64 = 36_500;

/// Shortest poll interval we allow; anything faster just burns rate limit.
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    pub bluesky_handle: String,
    pub bluesky_app_password: String,
    /// XRPC service the bot logs into (defaults to https://bsky.social).
    pub pds_url: String,
    pub poll_interval_secs: u64,
    pub max_poll_backoff_secs: u64,
    pub recent_days: i64,
    pub min_replies_for_ratio: u64,
    /// Feed entries read per mention.
    pub max_posts: usize,
    pub max_thread_segments: usize,
    /// Processing attempts per notification before it's given up on.
    pub max_retries: u32,
    /// Only answer accounts that follow the bot.
    pub require_follow: bool,
    pub db_path: String,
    pub health_check_port: u16,
    pub health_check_bind: String,
    /// Used for the log filter when RUST_LOG isn't set.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset and empty values take the
    /// default; set values that don't parse are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let poll_interval_secs: u64 = parse_or(&get, "POLL_INTERVAL", 30)?;
        if poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            anyhow::bail!(
                "POLL_INTERVAL must be at least {MIN_POLL_INTERVAL_SECS} seconds (got {poll_interval_secs})"
            );
        }

        let max_thread_segments: usize = parse_or(&get, "MAX_THREAD_SEGMENTS", 3)?;
        if max_thread_segments == 0 {
            anyhow::bail!("MAX_THREAD_SEGMENTS must be at least 1");
        }
        let max_retries: u32 = parse_or(&get, "MAX_RETRIES", 5)?;
        if max_retries == 0 {
            anyhow::bail!("MAX_RETRIES must be at least 1");
        }
        let recent_days: i64 = parse_or(&get, "RECENT_DAYS", 30)?;
        if !(1..=MAX_RECENT_DAYS).contains(&recent_days) {
            anyhow::bail!("RECENT_DAYS must be between 1 and {MAX_RECENT_DAYS} (got {recent_days})");
        }
        let max_posts: usize = parse_or(&get, "MAX_POSTS", 1000)?;
        if max_posts == 0 {
            anyhow::bail!("MAX_POSTS must be at least 1");
        }

        Ok(Self {
            bluesky_handle: get("BLUESKY_HANDLE")
                .map(|h| h.trim_start_matches('@').to_string())
                .unwrap_or_default(),
            bluesky_app_password: get("BLUESKY_APP_PASSWORD").unwrap_or_default(),
            pds_url: get("PDS_URL").unwrap_or_else(|| DEFAULT_PDS_URL.to_string()),
            poll_interval_secs,
            max_poll_backoff_secs: parse_or(&get, "MAX_POLL_BACKOFF", 300)?,
            recent_days,
            min_replies_for_ratio: parse_or(&get, "MIN_REPLIES_FOR_RATIO", 5)?,
            max_posts,
            max_thread_segments,
            max_retries,
            require_follow: parse_bool_or(&get, "REQUIRE_FOLLOW", false)?,
            db_path: get("BOT_DB_PATH").unwrap_or_else(|| "./tallybot.db".to_string()),
            health_check_port: parse_or(&get, "HEALTH_CHECK_PORT", 8080)?,
            health_check_bind: get("HEALTH_CHECK_BIND").unwrap_or_else(|| "0.0.0.0".to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Check that the bot's Bluesky credentials are configured.
    /// Call this before anything that talks to the network.
    pub fn require_bluesky(&self) -> Result<()> {
        if self.bluesky_handle.is_empty() {
            anyhow::bail!(
                "BLUESKY_HANDLE not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        if self.bluesky_app_password.is_empty() {
            anyhow::bail!(
                "BLUESKY_APP_PASSWORD not set. Create an app password in Bluesky\n\
                 settings and add it to your .env file."
            );
        }
        Ok(())
    }

    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            recent_window: TimeDelta::try_days(self.recent_days).unwrap_or(TimeDelta::MAX),
            min_replies_for_ratio: self.min_replies_for_ratio,
        }
    }

    pub fn composer_settings(&self) -> ComposerSettings {
        ComposerSettings {
            max_chars: MAX_POST_CHARS,
            max_preview_chars: MAX_PREVIEW_CHARS,
            max_segments: self.max_thread_segments,
            recent_days: self.recent_days,
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_poll_backoff: Duration::from_secs(self.max_poll_backoff_secs),
            max_posts: self.max_posts,
            max_retries: self.max_retries,
            require_follow: self.require_follow,
            call_policy: BackoffPolicy::default(),
            max_notification_pages: DEFAULT_MAX_PAGES,
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a number (got {raw:?})")),
        None => Ok(default),
    }
}

fn parse_bool_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{key} must be true or false (got {v:?})"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.pds_url, "https://bsky.social");
        assert_eq!(c.poll_interval_secs, 30);
        assert_eq!(c.max_poll_backoff_secs, 300);
        assert_eq!(c.recent_days, 30);
        assert_eq!(c.min_replies_for_ratio, 5);
        assert_eq!(c.max_posts, 1000);
        assert_eq!(c.max_thread_segments, 3);
        assert_eq!(c.max_retries, 5);
        assert!(!c.require_follow);
        assert_eq!(c.db_path, "./tallybot.db");
        assert_eq!(c.health_check_port, 8080);
        assert_eq!(c.health_check_bind, "0.0.0.0");
        assert_eq!(c.log_level, "info");
    }

    #[test]
    fn overrides_and_handle_normalization() {
        let c = config(&[
            ("BLUESKY_HANDLE", "@stats.bsky.social"),
            ("POLL_INTERVAL", "60"),
            ("REQUIRE_FOLLOW", "TRUE"),
            ("MAX_POSTS", " 250 "),
        ])
        .unwrap();
        assert_eq!(c.bluesky_handle, "stats.bsky.social");
        assert_eq!(c.poll_interval_secs, 60);
        assert!(c.require_follow);
        assert_eq!(c.max_posts, 250);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = config(&[("MAX_RETRIES", "lots")]).unwrap_err();
        assert!(err.to_string().contains("MAX_RETRIES"));
        assert!(config(&[("HEALTH_CHECK_PORT", "70000")]).is_err());
        assert!(config(&[("REQUIRE_FOLLOW", "maybe")]).is_err());
    }

    #[test]
    fn bounds_are_enforced() {
        assert!(config(&[("POLL_INTERVAL", "5")]).is_err());
        assert!(config(&[("MAX_THREAD_SEGMENTS", "0")]).is_err());
        assert!(config(&[("MAX_RETRIES", "0")]).is_err());
        assert!(config(&[("RECENT_DAYS", "0")]).is_err());
        assert!(config(&[("MAX_POSTS", "0")]).is_err());
    }

    #[test]
    fn oversized_recent_window_is_rejected() {
        let err = config(&[("RECENT_DAYS", "200000000")]).unwrap_err();
        assert!(err.to_string().contains("RECENT_DAYS"));

        let c = config(&[("RECENT_DAYS", "36500")]).unwrap();
        let analyzer = crate::analytics::EngagementAnalyzer::new(c.analyzer_settings());
        let result = analyzer.analyze(&[], chrono::Utc::now());
        assert!(result.is_empty());
    }

    #[test]
    fn empty_values_take_defaults() {
        let c = config(&[("POLL_INTERVAL", ""), ("BOT_DB_PATH", "  ")]).unwrap();
        assert_eq!(c.poll_interval_secs, 30);
        assert_eq!(c.db_path, "./tallybot.db");
    }

    #[test]
    fn require_bluesky_needs_both_credentials() {
        assert!(config(&[]).unwrap().require_bluesky().is_err());
        assert!(config(&[("BLUESKY_HANDLE", "bot.test")])
            .unwrap()
            .require_bluesky()
            .is_err());
        assert!(config(&[("BLUESKY_HANDLE", "bot.test"), ("BLUESKY_APP_PASSWORD", "xxxx")])
            .unwrap()
            .require_bluesky()
            .is_ok());
    }

    #[test]
    fn settings_follow_config() {
        let c = config(&[("RECENT_DAYS", "7"), ("MAX_THREAD_SEGMENTS", "2")]).unwrap();
        assert_eq!(c.analyzer_settings().recent_window, TimeDelta::days(7));
        assert_eq!(c.composer_settings().recent_days, 7);
        assert_eq!(c.composer_settings().max_segments, 2);
        assert_eq!(
            c.orchestrator_settings().poll_interval,
            Duration::from_secs(30)
        );
    }
}
