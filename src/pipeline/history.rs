// Post history retrieval — bounded, paginated.
//
// Reads at most `max_posts` feed entries (reposts count toward the bound even
// though they're dropped) so a prolific account can't make one mention cost
// unbounded requests.

use tracing::debug;

use super::backoff::{retry_transient, BackoffPolicy};
use crate::bluesky::posts::MAX_PAGE_SIZE;
use crate::bluesky::SocialClient;
use crate::error::SocialError;
use crate::models::Post;

/// Fetch up to `max_posts` of `actor`'s posts, newest first. Each page gets
/// its own transient-retry budget from `policy`.
pub async fn fetch_history(
    client: &dyn SocialClient,
    actor: &str,
    max_posts: usize,
    policy: &BackoffPolicy,
) -> Result<Vec<Post>, SocialError> {
    let mut posts = Vec::new();
    let mut cursor: Option<String> = None;
    let mut items_read = 0usize;

    while items_read < max_posts {
        let limit = (max_posts - items_read).min(MAX_PAGE_SIZE as usize) as u32;
        let page = retry_transient(policy, "getAuthorFeed", || {
            client.list_posts(actor, cursor.as_deref(), limit)
        })
        .await?;

        if page.items_seen == 0 {
            break;
        }
        items_read += page.items_seen;
        posts.extend(page.posts);

        cursor = page.cursor;
        if cursor.is_none() {
            break;
        }
    }

    debug!(actor = actor, posts = posts.len(), items = items_read, "Fetched post history");
    Ok(posts)
}
