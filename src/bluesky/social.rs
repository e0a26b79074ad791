// SocialClient trait — the narrow interface the pipeline talks to.
//
// BlueskyClient is the production implementation. Tests drive the pipeline
// with scripted fakes. Every method fails with a classified SocialError so
// callers can decide between retrying and giving up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::client::BlueskyClient;
use super::notifications::NotificationPage;
use super::posts::PostPage;
use crate::error::SocialError;
use crate::models::PostRef;

#[async_trait]
pub trait SocialClient: Send + Sync {
    /// One page of notifications, newest first. `cursor` None = newest page.
    async fn list_notifications(
        &self,
        cursor: Option<&str>,
    ) -> Result<NotificationPage, SocialError>;

    /// One page of `actor`'s own posts, newest first.
    async fn list_posts(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<PostPage, SocialError>;

    /// Reply to `parent` in the thread rooted at `root`; returns the new post.
    async fn post_reply(
        &self,
        parent: &PostRef,
        root: &PostRef,
        text: &str,
    ) -> Result<PostRef, SocialError>;

    /// Whether `actor` follows the bot.
    async fn is_followed_by(&self, actor: &str) -> Result<bool, SocialError>;

    /// Mark notifications up to `seen_at` as read. Optional for implementors.
    async fn update_seen(&self, _seen_at: DateTime<Utc>) -> Result<(), SocialError> {
        Ok(())
    }
}

#[async_trait]
impl SocialClient for BlueskyClient {
    async fn list_notifications(
        &self,
        cursor: Option<&str>,
    ) -> Result<NotificationPage, SocialError> {
        self.list_notifications_page(cursor).await
    }

    async fn list_posts(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<PostPage, SocialError> {
        self.author_feed_page(actor, cursor, limit).await
    }

    async fn post_reply(
        &self,
        parent: &PostRef,
        root: &PostRef,
        text: &str,
    ) -> Result<PostRef, SocialError> {
        self.create_reply(parent, root, text).await
    }

    async fn is_followed_by(&self, actor: &str) -> Result<bool, SocialError> {
        BlueskyClient::is_followed_by(self, actor).await
    }

    async fn update_seen(&self, seen_at: DateTime<Utc>) -> Result<(), SocialError> {
        BlueskyClient::update_seen(self, seen_at).await
    }
}
