// Rich-text link facets.
//
// Bluesky doesn't auto-link URLs in post text: each link needs an explicit
// `app.bsky.richtext.facet` with UTF-8 byte offsets into the text.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s)\]}>,"']+"#).expect("URL pattern is valid")
});

/// Trailing characters that end a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ':', ';', '!', '?', ')'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<LinkFeature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkFeature {
    #[serde(rename = "$type")]
    pub kind: &'static str,
    pub uri: String,
}

/// Find every http(s) URL in `text` and build a link facet for it.
pub fn detect_link_facets(text: &str) -> Vec<Facet> {
    URL_RE
        .find_iter(text)
        .filter_map(|m| {
            let url = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            if url.is_empty() {
                return None;
            }
            // regex-lite offsets are byte offsets already
            let byte_start = m.start();
            Some(Facet {
                index: ByteSlice {
                    byte_start,
                    byte_end: byte_start + url.len(),
                },
                features: vec![LinkFeature {
                    kind: "app.bsky.richtext.facet#link",
                    uri: url.to_string(),
                }],
            })
        })
        .collect()
}
