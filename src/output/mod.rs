// Output formatting — reply composition and terminal display.

pub mod reply;
pub mod terminal;

pub use reply::{ComposerSettings, ReplyComposer};

/// Truncate a string to at most `max_chars` characters, ending in "..." if truncated.
///
/// The ellipsis counts toward the limit, so the result is never longer than
/// `max_chars`. Works on `char` boundaries and never panics on multi-byte text.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    const ELLIPSIS: &str = "...";

    let char_count = text.chars().count();
    if char_count <= max_chars {
        return text.to_string();
    }
    if max_chars <= ELLIPSIS.len() {
        return text.chars().take(max_chars).collect();
    }
    let truncated: String = text.chars().take(max_chars - ELLIPSIS.len()).collect();
    format!("{}{ELLIPSIS}", truncated.trim_end())
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
