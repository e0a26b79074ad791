// Reply posting — builds `app.bsky.feed.post` records and writes them to the
// bot's repo with `com.atproto.repo.createRecord`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::client::BlueskyClient;
use super::facets::detect_link_facets;
use super::notifications::{require_at_uri, require_non_empty};
use crate::error::SocialError;
use crate::models::PostRef;

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
    cid: String,
}

impl BlueskyClient {
    /// Post `text` as a reply to `parent` in the thread rooted at `root`.
    pub async fn create_reply(
        &self,
        parent: &PostRef,
        root: &PostRef,
        text: &str,
    ) -> Result<PostRef, SocialError> {
        let record = build_reply_record(text, parent, root, Utc::now());
        let body = json!({
            "repo": self.did().await,
            "collection": "app.bsky.feed.post",
            "record": record,
        });

        let created: CreateRecordResponse = self
            .xrpc_post("com.atproto.repo.createRecord", &body)
            .await?;
        require_at_uri("createRecord.uri", &created.uri)?;
        require_non_empty("createRecord.cid", &created.cid)?;

        debug!(uri = %created.uri, parent = %parent.uri, "Posted reply");
        Ok(PostRef::new(created.uri, created.cid))
    }

    /// Mark notifications up to `seen_at` as read.
    pub async fn update_seen(&self, seen_at: DateTime<Utc>) -> Result<(), SocialError> {
        let body = json!({ "seenAt": seen_at.to_rfc3339_opts(SecondsFormat::Millis, true) });
        self.xrpc_post_unit("app.bsky.notification.updateSeen", &body)
            .await
    }
}

/// The post record for a reply, with link facets when the text has URLs.
pub fn build_reply_record(
    text: &str,
    parent: &PostRef,
    root: &PostRef,
    now: DateTime<Utc>,
) -> serde_json::Value {
    let mut record = json!({
        "$type": "app.bsky.feed.post",
        "text": text,
        "createdAt": now.to_rfc3339_opts(SecondsFormat::Millis, true),
        "reply": {
            "root": { "uri": root.uri, "cid": root.cid },
            "parent": { "uri": parent.uri, "cid": parent.cid },
        },
    });

    let facets = detect_link_facets(text);
    if !facets.is_empty() {
        record["facets"] = json!(facets);
    }
    record
}
