// Unit tests for the Bluesky boundary: strict parsing of notification and
// feed responses, and error classification.
//
// Fixtures are trimmed-down copies of real API responses.

use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::json;

use tallybot::bluesky::client::classify_response;
use tallybot::bluesky::notifications::{parse_notification, parse_notification_page};
use tallybot::bluesky::posts::{parse_feed_item, parse_feed_page};
use tallybot::error::SocialError;
use tallybot::models::NotificationReason;

fn mention_entry(rkey: &str, indexed_at: &str) -> serde_json::Value {
    json!({
        "uri": format!("at://did:plc:alice/app.bsky.feed.post/{rkey}"),
        "cid": format!("bafy-{rkey}"),
        "author": { "did": "did:plc:alice", "handle": "alice.test", "displayName": "Alice" },
        "reason": "mention",
        "record": {
            "$type": "app.bsky.feed.post",
            "text": "@tallybot.test stats please",
            "createdAt": indexed_at
        },
        "isRead": false,
        "indexedAt": indexed_at,
        "labels": []
    })
}

fn feed_item(rkey: &str, likes: Option<u64>) -> serde_json::Value {
    let mut post = json!({
        "uri": format!("at://did:plc:alice/app.bsky.feed.post/{rkey}"),
        "cid": format!("bafy-{rkey}"),
        "author": { "did": "did:plc:alice", "handle": "alice.test" },
        "record": {
            "$type": "app.bsky.feed.post",
            "text": format!("post {rkey}"),
            "createdAt": "2026-03-01T10:00:00.000Z"
        },
        "replyCount": 4,
        "repostCount": 2,
        "indexedAt": "2026-03-01T10:00:01.123Z"
    });
    if let Some(likes) = likes {
        post["likeCount"] = json!(likes);
    }
    json!({ "post": post })
}

// ============================================================
// Notifications
// ============================================================

#[test]
fn parses_mention() {
    let n = parse_notification(mention_entry("m1", "2026-03-01T12:00:00.000Z")).unwrap();
    assert_eq!(n.id, "at://did:plc:alice/app.bsky.feed.post/m1");
    assert_eq!(n.author_handle, "alice.test");
    assert_eq!(n.author_did, "did:plc:alice");
    assert_eq!(n.reason, NotificationReason::Mention);
    assert_eq!(n.created_at, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
    assert_eq!(n.post.cid, "bafy-m1");
    // not a reply, so the mention is its own thread root
    assert_eq!(n.thread_root, n.post);
    assert_eq!(n.subject_post_uri, n.id);
}

#[test]
fn mention_inside_thread_roots_at_thread_root() {
    let mut entry = mention_entry("m2", "2026-03-01T12:00:00Z");
    entry["record"]["reply"] = json!({
        "root": { "uri": "at://did:plc:carol/app.bsky.feed.post/root", "cid": "bafy-root" },
        "parent": { "uri": "at://did:plc:bob/app.bsky.feed.post/p", "cid": "bafy-p" }
    });
    let n = parse_notification(entry).unwrap();
    assert_eq!(n.thread_root.uri, "at://did:plc:carol/app.bsky.feed.post/root");
    assert_eq!(n.thread_root.cid, "bafy-root");
    assert_eq!(n.post.uri, "at://did:plc:alice/app.bsky.feed.post/m2");
}

#[test]
fn other_reasons_map_to_other() {
    let mut entry = mention_entry("l1", "2026-03-01T12:00:00Z");
    entry["reason"] = json!("like");
    assert_eq!(parse_notification(entry).unwrap().reason, NotificationReason::Other);
    let mut entry = mention_entry("r1", "2026-03-01T12:00:00Z");
    entry["reason"] = json!("reply");
    assert_eq!(parse_notification(entry).unwrap().reason, NotificationReason::Reply);
}

#[test]
fn missing_or_invalid_fields_are_malformed() {
    let mut no_author = mention_entry("x", "2026-03-01T12:00:00Z");
    no_author.as_object_mut().unwrap().remove("author");
    let mut bad_time = mention_entry("x", "2026-03-01T12:00:00Z");
    bad_time["indexedAt"] = json!("last tuesday");
    let mut bad_uri = mention_entry("x", "2026-03-01T12:00:00Z");
    bad_uri["uri"] = json!("https://example.com/post");
    let mut empty_handle = mention_entry("x", "2026-03-01T12:00:00Z");
    empty_handle["author"]["handle"] = json!("");
    let mut broken_root = mention_entry("x", "2026-03-01T12:00:00Z");
    broken_root["record"]["reply"] = json!({ "parent": {} });

    for entry in [no_author, bad_time, bad_uri, empty_handle, broken_root] {
        let err = parse_notification(entry).unwrap_err();
        assert!(matches!(err, SocialError::Malformed(_)), "{err}");
    }
}

#[test]
fn page_rejects_bad_entries_individually() {
    let mut bad = mention_entry("bad", "2026-03-01T12:00:00Z");
    bad["indexedAt"] = json!(42);
    let raw = json!({
        "notifications": [
            mention_entry("good1", "2026-03-01T12:00:02Z"),
            bad,
            mention_entry("good2", "2026-03-01T12:00:01Z"),
        ],
        "cursor": "next-page"
    });
    let page = parse_notification_page(raw).unwrap();
    assert_eq!(page.notifications.len(), 2);
    assert_eq!(page.rejected.len(), 1);
    assert_eq!(
        page.rejected[0].id.as_deref(),
        Some("at://did:plc:alice/app.bsky.feed.post/bad")
    );
    assert_eq!(page.cursor.as_deref(), Some("next-page"));
}

#[test]
fn broken_envelope_is_malformed() {
    let err = parse_notification_page(json!({ "items": [] })).unwrap_err();
    assert!(matches!(err, SocialError::Malformed(_)));
    let err = parse_notification_page(json!({ "notifications": "nope" })).unwrap_err();
    assert!(matches!(err, SocialError::Malformed(_)));
}

#[test]
fn empty_cursor_means_last_page() {
    let page = parse_notification_page(json!({ "notifications": [], "cursor": "" })).unwrap();
    assert!(page.cursor.is_none());
}

// ============================================================
// Author feed
// ============================================================

#[test]
fn parses_post_with_defaults_for_missing_counts() {
    let post = parse_feed_item(feed_item("p1", None)).unwrap().unwrap();
    assert_eq!(post.like_count, 0);
    assert_eq!(post.repost_count, 2);
    assert_eq!(post.reply_count, 4);
    assert_eq!(post.text, "post p1");
    assert_eq!(post.author_handle, "alice.test");
    // indexedAt wins over record.createdAt
    assert_eq!(
        post.created_at,
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 1).unwrap()
            + chrono::Duration::milliseconds(123)
    );
}

#[test]
fn falls_back_to_record_created_at() {
    let mut item = feed_item("p2", Some(3));
    item["post"].as_object_mut().unwrap().remove("indexedAt");
    let post = parse_feed_item(item).unwrap().unwrap();
    assert_eq!(post.created_at, Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap());
}

#[test]
fn no_timestamp_is_malformed() {
    let mut item = feed_item("p3", Some(3));
    item["post"].as_object_mut().unwrap().remove("indexedAt");
    item["post"]["record"].as_object_mut().unwrap().remove("createdAt");
    assert!(matches!(parse_feed_item(item), Err(SocialError::Malformed(_))));
}

#[test]
fn negative_count_is_malformed() {
    let mut item = feed_item("p4", None);
    item["post"]["likeCount"] = json!(-1);
    assert!(parse_feed_item(item).is_err());
}

#[test]
fn reposts_are_skipped_but_pins_kept() {
    let mut repost = feed_item("rp", Some(1));
    repost["reason"] = json!({
        "$type": "app.bsky.feed.defs#reasonRepost",
        "by": { "did": "did:plc:alice", "handle": "alice.test" },
        "indexedAt": "2026-03-02T00:00:00Z"
    });
    assert_eq!(parse_feed_item(repost).unwrap(), None);

    let mut pinned = feed_item("pin", Some(1));
    pinned["reason"] = json!({ "$type": "app.bsky.feed.defs#reasonPin" });
    assert!(parse_feed_item(pinned).unwrap().is_some());
}

#[test]
fn feed_page_counts_items_and_rejections() {
    let mut bad = feed_item("bad", Some(1));
    bad["post"]["uri"] = json!("");
    let mut repost = feed_item("rp", Some(1));
    repost["reason"] = json!({ "$type": "app.bsky.feed.defs#reasonRepost" });

    let raw = json!({
        "feed": [feed_item("a", Some(1)), bad, repost, feed_item("b", Some(2))],
        "cursor": "c2"
    });
    let page = parse_feed_page(raw).unwrap();
    assert_eq!(page.items_seen, 4);
    assert_eq!(page.rejected, 1);
    assert_eq!(page.posts.len(), 2);
    assert_eq!(page.cursor.as_deref(), Some("c2"));
}

// ============================================================
// Error classification
// ============================================================

#[test]
fn classification_matches_error_kinds() {
    let nsid = "app.bsky.feed.getAuthorFeed";
    assert!(classify_response(nsid, StatusCode::BAD_GATEWAY, "", None).is_transient());
    assert!(classify_response(nsid, StatusCode::TOO_MANY_REQUESTS, "", None).is_transient());
    assert_eq!(
        classify_response(nsid, StatusCode::NOT_FOUND, "", None).kind(),
        "permanent"
    );
    let body = r#"{"error":"InvalidRequest","message":"Profile not found"}"#;
    assert_eq!(
        classify_response(nsid, StatusCode::BAD_REQUEST, body, None).kind(),
        "permanent"
    );
}
