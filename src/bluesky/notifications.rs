// Notification listing and validation.
//
// `app.bsky.notification.listNotifications` returns newest-first pages. The
// envelope must parse or the whole page is Malformed; individual entries are
// validated one by one so a single bad entry can't wedge the poller.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::client::{ActorView, BlueskyClient};
use crate::error::SocialError;
use crate::models::{Notification, NotificationReason, PostRef};

/// Entries per page (API max is 100).
pub const PAGE_LIMIT: &str = "50";

/// One page of notifications, newest first as the API returns them.
#[derive(Debug, Clone, Default)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    /// Entries that failed validation, with the reason. Never processed.
    pub rejected: Vec<RejectedNotification>,
    pub cursor: Option<String>,
}

/// A notification entry that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedNotification {
    /// The entry's uri, if it had one.
    pub id: Option<String>,
    pub error: String,
}

#[derive(Debug, Deserialize)]
struct ListNotificationsResponse {
    notifications: Vec<serde_json::Value>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationView {
    uri: String,
    cid: String,
    author: ActorView,
    reason: String,
    reason_subject: Option<String>,
    #[serde(default)]
    record: serde_json::Value,
    indexed_at: String,
}

impl BlueskyClient {
    /// Fetch one page of notifications, starting at `cursor` (None = newest).
    pub async fn list_notifications_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<NotificationPage, SocialError> {
        let mut params: Vec<(&str, &str)> = vec![("limit", PAGE_LIMIT)];
        if let Some(c) = cursor {
            params.push(("cursor", c));
        }

        let raw: serde_json::Value = self
            .xrpc_get("app.bsky.notification.listNotifications", &params)
            .await?;
        let page = parse_notification_page(raw)?;

        debug!(
            page_size = page.notifications.len(),
            rejected = page.rejected.len(),
            "Fetched page of notifications"
        );
        Ok(page)
    }
}

/// Validate a listNotifications response body.
pub fn parse_notification_page(raw: serde_json::Value) -> Result<NotificationPage, SocialError> {
    let envelope: ListNotificationsResponse = serde_json::from_value(raw).map_err(|e| {
        SocialError::Malformed(format!("listNotifications envelope: {e}"))
    })?;

    let mut page = NotificationPage {
        cursor: envelope.cursor.filter(|c| !c.is_empty()),
        ..Default::default()
    };

    for entry in envelope.notifications {
        let id = entry
            .get("uri")
            .and_then(|v| v.as_str())
            .map(String::from);
        match parse_notification(entry) {
            Ok(n) => page.notifications.push(n),
            Err(e) => page.rejected.push(RejectedNotification {
                id,
                error: e.to_string(),
            }),
        }
    }

    Ok(page)
}

/// Validate a single notification entry.
pub fn parse_notification(raw: serde_json::Value) -> Result<Notification, SocialError> {
    let view: NotificationView = serde_json::from_value(raw)?;

    require_at_uri("uri", &view.uri)?;
    require_non_empty("cid", &view.cid)?;
    require_non_empty("author.did", &view.author.did)?;
    require_non_empty("author.handle", &view.author.handle)?;

    let created_at = parse_timestamp("indexedAt", &view.indexed_at)?;
    let post = PostRef::new(&view.uri, &view.cid);
    let thread_root = reply_root(&view.record)?.unwrap_or_else(|| post.clone());

    Ok(Notification {
        subject_post_uri: view.reason_subject.unwrap_or_else(|| view.uri.clone()),
        id: view.uri,
        author_did: view.author.did,
        author_handle: view.author.handle,
        reason: NotificationReason::from_api(&view.reason),
        created_at,
        post,
        thread_root,
    })
}

/// `record.reply.root` of a post record, if the post is itself a reply.
fn reply_root(record: &serde_json::Value) -> Result<Option<PostRef>, SocialError> {
    let Some(reply) = record.get("reply") else {
        return Ok(None);
    };
    let root = reply
        .get("root")
        .ok_or_else(|| SocialError::Malformed("record.reply has no root".into()))?;
    let field = |name: &str| {
        root.get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SocialError::Malformed(format!("record.reply.root.{name} missing")))
    };
    let uri = field("uri")?;
    require_at_uri("record.reply.root.uri", uri)?;
    Ok(Some(PostRef::new(uri, field("cid")?)))
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), SocialError> {
    if value.trim().is_empty() {
        return Err(SocialError::Malformed(format!("{field} is empty")));
    }
    Ok(())
}

pub(crate) fn require_at_uri(field: &str, value: &str) -> Result<(), SocialError> {
    if !value.starts_with("at://") || value.len() <= "at://".len() {
        return Err(SocialError::Malformed(format!("{field} is not an AT-URI: {value:?}")));
    }
    Ok(())
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, SocialError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SocialError::Malformed(format!("{field} {value:?}: {e}")))
}
