// Post history — paginated author feed retrieval and validation.
//
// Fetches a user's posts from `app.bsky.feed.getAuthorFeed`. Reposts of other
// people's posts are dropped; we only rank what the account wrote. Pinned
// posts come through as-is and may show up twice (the analyzer dedups).

use serde::Deserialize;
use tracing::debug;

use super::client::{ActorView, BlueskyClient};
use super::notifications::{parse_timestamp, require_at_uri, require_non_empty};
use crate::error::SocialError;
use crate::models::Post;

/// Posts per page (API max is 100).
pub const MAX_PAGE_SIZE: u32 = 100;

const REASON_PIN: &str = "app.bsky.feed.defs#reasonPin";

/// One page of an author feed.
#[derive(Debug, Clone, Default)]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// Feed entries on the page before filtering (0 means the feed is exhausted).
    pub items_seen: usize,
    /// Entries skipped because they failed validation.
    pub rejected: usize,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorFeedResponse {
    feed: Vec<serde_json::Value>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: PostView,
    #[serde(default)]
    reason: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    uri: String,
    cid: String,
    author: ActorView,
    #[serde(default)]
    record: serde_json::Value,
    like_count: Option<u64>,
    repost_count: Option<u64>,
    reply_count: Option<u64>,
    indexed_at: Option<String>,
}

impl BlueskyClient {
    /// Fetch one page of `actor`'s feed.
    pub async fn author_feed_page(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<PostPage, SocialError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut params: Vec<(&str, &str)> = vec![("actor", actor), ("limit", &limit)];
        if let Some(c) = cursor {
            params.push(("cursor", c));
        }

        let raw: serde_json::Value = self
            .xrpc_get("app.bsky.feed.getAuthorFeed", &params)
            .await?;
        let page = parse_feed_page(raw)?;

        debug!(
            actor = actor,
            page_posts = page.posts.len(),
            items = page.items_seen,
            rejected = page.rejected,
            "Fetched page of posts"
        );
        Ok(page)
    }
}

/// Validate a getAuthorFeed response body.
pub fn parse_feed_page(raw: serde_json::Value) -> Result<PostPage, SocialError> {
    let envelope: AuthorFeedResponse = serde_json::from_value(raw)
        .map_err(|e| SocialError::Malformed(format!("getAuthorFeed envelope: {e}")))?;

    let mut page = PostPage {
        items_seen: envelope.feed.len(),
        cursor: envelope.cursor.filter(|c| !c.is_empty()),
        ..Default::default()
    };

    for item in envelope.feed {
        match parse_feed_item(item) {
            Ok(Some(post)) => page.posts.push(post),
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "Skipping invalid feed item");
                page.rejected += 1;
            }
        }
    }

    Ok(page)
}

/// Validate one feed item. `Ok(None)` for reposts.
pub fn parse_feed_item(raw: serde_json::Value) -> Result<Option<Post>, SocialError> {
    let item: FeedViewPost = serde_json::from_value(raw)?;

    if let Some(reason) = &item.reason {
        let kind = reason.get("$type").and_then(|v| v.as_str());
        if kind != Some(REASON_PIN) {
            return Ok(None);
        }
    }

    let view = item.post;
    require_at_uri("post.uri", &view.uri)?;
    require_non_empty("post.cid", &view.cid)?;
    require_non_empty("post.author.handle", &view.author.handle)?;

    let record_created_at = view.record.get("createdAt").and_then(|v| v.as_str());
    let created_at = match (view.indexed_at.as_deref(), record_created_at) {
        (Some(indexed), _) => parse_timestamp("post.indexedAt", indexed)?,
        (None, Some(created)) => parse_timestamp("post.record.createdAt", created)?,
        (None, None) => {
            return Err(SocialError::Malformed(format!(
                "post {} has no timestamp",
                view.uri
            )))
        }
    };

    let text = view
        .record
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(Some(Post {
        uri: view.uri,
        cid: view.cid,
        author_handle: view.author.handle,
        text,
        created_at,
        like_count: view.like_count.unwrap_or(0),
        repost_count: view.repost_count.unwrap_or(0),
        reply_count: view.reply_count.unwrap_or(0),
    }))
}
