//! Scraping the few facts we need out of a channel's HTML page.

use std::sync::OnceLock;

use regex::Regex;

static CHANNEL_ID_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
static TITLE_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

fn channel_id_patterns() -> &'static [Regex] {
    CHANNEL_ID_PATTERNS.get_or_init(|| {
        compile(&[
            r#"<link rel="canonical" href="https?://(?:www\.)?youtube\.com/channel/(UC[\w-]{22})""#,
            r#"<meta itemprop="(?:channelId|identifier)" content="(UC[\w-]{22})""#,
            r#""externalId":"(UC[\w-]{22})""#,
            r#""browseId":"(UC[\w-]{22})""#,
            r#""channelId":"(UC[\w-]{22})""#,
        ])
    })
}

fn title_patterns() -> &'static [Regex] {
    TITLE_PATTERNS.get_or_init(|| {
        compile(&[
            r#"<meta property="og:title" content="([^"]*)""#,
            r#"<meta name="title" content="([^"]*)""#,
            r"<title>([^<]*)</title>",
        ])
    })
}

/// Canonical `UC…` id of the channel a page belongs to.
///
/// Patterns are tried from most to least specific; `channelId` also appears
/// for featured channels, so it comes last.
pub fn extract_channel_id(html: &str) -> Option<String> {
    channel_id_patterns()
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Channel name shown on the page.
pub fn extract_page_title(html: &str) -> Option<String> {
    title_patterns()
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| unescape_html(m.as_str()))
        .map(|t| t.trim_end_matches(" - YouTube").trim().to_string())
        .filter(|t| !t.is_empty() && t != "YouTube")
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
