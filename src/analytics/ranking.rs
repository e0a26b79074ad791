// Total orders used to rank posts.
//
// Each comparator returns `Greater` when `a` should be preferred over `b`,
// so `Iterator::max_by` picks the winner. Both orders end on the uri, which
// makes them total over a deduplicated history.

use std::cmp::Ordering;

use crate::models::Post;

/// Higher engagement, then more recent, then lexicographically smaller uri.
pub fn by_engagement(a: &Post, b: &Post) -> Ordering {
    a.engagement()
        .cmp(&b.engagement())
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| b.uri.cmp(&a.uri))
}

/// Higher replies/max(likes, 1), then more replies, then smaller uri.
///
/// Ratios are compared by cross-multiplication so equal ratios compare equal
/// exactly (no float rounding).
pub fn by_controversy(a: &Post, b: &Post) -> Ordering {
    let lhs = a.reply_count as u128 * b.like_count.max(1) as u128;
    let rhs = b.reply_count as u128 * a.like_count.max(1) as u128;
    lhs.cmp(&rhs)
        .then_with(|| a.reply_count.cmp(&b.reply_count))
        .then_with(|| b.uri.cmp(&a.uri))
}
