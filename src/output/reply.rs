// Reply composition — turns an AnalysisResult into thread segments.
//
// One segment per selected post, in the fixed order recent, all-time, most
// ratioed. Each segment is a label, the engagement numbers, a quoted preview
// of the post, and a link back to it. The preview shrinks to fit the
// character limit; the link is never truncated.

use crate::models::{rkey_of, AnalysisResult, Post};

use super::{collapse_whitespace, truncate_chars};

/// Bluesky's post length limit.
pub const MAX_POST_CHARS: usize = 300;

/// Upper bound on the quoted preview, before fitting to the limit.
pub const MAX_PREVIEW_CHARS: usize = 80;

/// Below this many characters a preview isn't worth showing.
const MIN_PREVIEW_CHARS: usize = 8;

const SEPARATOR: &str = "\n\n";
const NO_TEXT_PREVIEW: &str = "[Post content unavailable]";

#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub max_chars: usize,
    pub max_preview_chars: usize,
    /// Hard cap on the number of segments in one thread (at least 1).
    pub max_segments: usize,
    /// Shown in the recent-post label; should match the analyzer's window.
    pub recent_days: i64,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            max_chars: MAX_POST_CHARS,
            max_preview_chars: MAX_PREVIEW_CHARS,
            max_segments: 3,
            recent_days: 30,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplyComposer {
    settings: ComposerSettings,
}

impl ReplyComposer {
    pub fn new(settings: ComposerSettings) -> Self {
        Self { settings }
    }

    /// Build the ordered reply segments for `target_handle`.
    ///
    /// Absent selections are skipped. An empty result yields exactly one
    /// "no eligible posts" segment.
    pub fn compose(&self, result: &AnalysisResult, target_handle: &str) -> Vec<String> {
        let mut segments = Vec::with_capacity(3);

        if let Some(post) = &result.top_recent {
            let label = format!(
                "🔥 Recent ({}d) - {} total engagement",
                self.settings.recent_days,
                post.engagement()
            );
            segments.push(self.segment(&label, None, post, target_handle));
        }

        if let Some(post) = &result.top_all_time {
            let label = format!("👑 All-Time - {} total engagement", post.engagement());
            segments.push(self.segment(&label, None, post, target_handle));
        }

        if let Some(post) = &result.most_controversial {
            let score = format!("Ratio: {:.1}", post.controversy());
            segments.push(self.segment("🌶️ Most Ratioed", Some(&score), post, target_handle));
        }

        if segments.is_empty() {
            return vec![self.no_posts(target_handle)];
        }

        segments.truncate(self.settings.max_segments.max(1));
        segments
    }

    /// The single segment sent when nothing qualified.
    pub fn no_posts(&self, target_handle: &str) -> String {
        let text = format!(
            "No eligible posts found for @{target_handle} yet. \
             Start posting to build your engagement history! 🚀"
        );
        truncate_chars(&text, self.settings.max_chars)
    }

    /// Reply sent to non-followers when the follower gate is on.
    pub fn follow_prompt(&self, target_handle: &str) -> String {
        let text = format!(
            "Hi @{target_handle}! Follow me first and mention me again \
             to get your engagement stats. 📊"
        );
        truncate_chars(&text, self.settings.max_chars)
    }

    fn segment(&self, label: &str, score: Option<&str>, post: &Post, handle: &str) -> String {
        let max_chars = self.settings.max_chars;
        let sep = SEPARATOR.chars().count();
        let stats = format_engagement_stats(post.like_count, post.repost_count, post.reply_count);

        let mut head = vec![label.to_string(), stats];
        if let Some(score) = score {
            head.push(score.to_string());
        }
        let head = head.join(SEPARATOR);
        let head_len = head.chars().count();

        // A long handle would crowd out the preview; the DID form is short
        let mut url = post_url(&post.uri, Some(handle));
        if head_len + sep + url.chars().count() + sep + MIN_PREVIEW_CHARS > max_chars {
            url = post_url(&post.uri, None);
        }
        let url_len = url.chars().count();
        // Only a uri that isn't a post AT-URI can be this long
        if url_len + sep >= max_chars {
            return truncate_chars(&url, max_chars);
        }

        // The link is never cut; the head shrinks only if the link alone
        // leaves it too little room.
        let head = truncate_chars(&head, max_chars - url_len - sep);
        let room = max_chars.saturating_sub(head.chars().count() + url_len + 2 * sep);

        match preview(&post.text, room.min(self.settings.max_preview_chars)) {
            Some(preview) => [head, preview, url].join(SEPARATOR),
            None => [head, url].join(SEPARATOR),
        }
    }
}

/// Quoted, whitespace-collapsed preview of at most `budget` chars (quotes
/// included). `None` when the budget is too small to say anything useful.
fn preview(text: &str, budget: usize) -> Option<String> {
    if budget < MIN_PREVIEW_CHARS {
        return None;
    }
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        return (NO_TEXT_PREVIEW.chars().count() <= budget).then(|| NO_TEXT_PREVIEW.to_string());
    }
    Some(format!("\"{}\"", truncate_chars(&collapsed, budget - 2)))
}

/// "❤️ 234 | 🔄 56 | 💬 89"
pub fn format_engagement_stats(likes: u64, reposts: u64, replies: u64) -> String {
    format!("❤️ {likes} | 🔄 {reposts} | 💬 {replies}")
}

/// Convert an AT-URI into a bsky.app web link.
///
/// Uses the handle when given, the DID otherwise. Anything that isn't a
/// well-formed post AT-URI is returned unchanged.
pub fn post_url(uri: &str, handle: Option<&str>) -> String {
    let Some(rkey) = rkey_of(uri) else {
        return uri.to_string();
    };
    let did = uri
        .trim_start_matches("at://")
        .split('/')
        .next()
        .unwrap_or_default();
    let actor = handle.filter(|h| !h.is_empty()).unwrap_or(did);
    format!("https://bsky.app/profile/{actor}/post/{rkey}")
}
