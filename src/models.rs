// Domain types — validated notifications and posts.
//
// Everything the pipeline touches is built here from already-validated wire
// data (see bluesky::notifications and bluesky::posts). Nothing in this module
// does I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A strong reference to a record: the pair Bluesky needs to reply to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

impl PostRef {
    pub fn new(uri: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            cid: cid.into(),
        }
    }
}

/// Why a notification was delivered to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationReason {
    Mention,
    Reply,
    Other,
}

impl NotificationReason {
    /// Map the XRPC `reason` string. Anything we don't act on is `Other`.
    pub fn from_api(reason: &str) -> Self {
        match reason {
            "mention" => NotificationReason::Mention,
            "reply" => NotificationReason::Reply,
            _ => NotificationReason::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationReason::Mention => "mention",
            NotificationReason::Reply => "reply",
            NotificationReason::Other => "other",
        }
    }
}

impl std::fmt::Display for NotificationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification as fetched from the network. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification id (the AT-URI of the record that caused it).
    pub id: String,
    pub author_did: String,
    pub author_handle: String,
    pub reason: NotificationReason,
    pub created_at: DateTime<Utc>,
    /// The post the notification is about. For mentions this is the mention itself.
    pub subject_post_uri: String,
    /// The mentioning post, as a reply target.
    pub post: PostRef,
    /// Root of the thread the mentioning post lives in (the post itself if it
    /// is not a reply).
    pub thread_root: PostRef,
}

impl Notification {
    pub fn is_mention(&self) -> bool {
        self.reason == NotificationReason::Mention
    }
}

/// A point-in-time snapshot of one post and its engagement counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub uri: String,
    pub cid: String,
    pub author_handle: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
    pub repost_count: u64,
    pub reply_count: u64,
}

impl Post {
    /// likes + reposts + replies.
    pub fn engagement(&self) -> u64 {
        self.like_count
            .saturating_add(self.repost_count)
            .saturating_add(self.reply_count)
    }

    /// replies / max(likes, 1).
    pub fn controversy(&self) -> f64 {
        self.reply_count as f64 / self.like_count.max(1) as f64
    }

    /// Record key — the last path segment of the AT-URI.
    pub fn rkey(&self) -> Option<&str> {
        rkey_of(&self.uri)
    }
}

/// Extract the record key from an AT-URI (`at://<did>/<collection>/<rkey>`).
pub fn rkey_of(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("at://")?;
    let mut parts = rest.split('/');
    let _authority = parts.next().filter(|s| !s.is_empty())?;
    let _collection = parts.next().filter(|s| !s.is_empty())?;
    parts.next().filter(|s| !s.is_empty())
}

/// The three selections produced for one user's history. Any may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    pub top_recent: Option<Post>,
    pub top_all_time: Option<Post>,
    pub most_controversial: Option<Post>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.top_recent.is_none() && self.top_all_time.is_none() && self.most_controversial.is_none()
    }
}
