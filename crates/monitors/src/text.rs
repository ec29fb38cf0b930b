//! Text helpers for building notification summaries.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum characters kept in a notification summary.
pub const SUMMARY_MAX_CHARS: usize = 100;

static RE_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)</?[^>]+>").expect("valid tag pattern"));
static RE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid ws pattern"));

/// Truncate to `max_chars` characters, appending `...` when anything was cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Remove HTML tags, decode entities and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let without_tags = RE_TAGS.replace_all(html, "");
    let decoded = html_escape::decode_html_entities(&without_tags);
    RE_WS.replace_all(&decoded, " ").trim().to_string()
}

/// Plain-text summary of an HTML fragment.
pub fn summarize_html(html: &str) -> String {
    truncate(&strip_html(html), SUMMARY_MAX_CHARS)
}
