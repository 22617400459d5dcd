//! Discogs URL filtering.
//!
//! No URL is trusted from any source, the backend included: anything that is
//! not an http(s) URL on a Discogs host is dropped before rendering or caching.

use url::Url;

const DISCOGS_HOST: &str = "discogs.com";

/// Returns the normalized URL when it points at Discogs, `None` otherwise.
pub fn safe_discogs_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = Url::parse(trimmed).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    if host == DISCOGS_HOST || host.ends_with(&format!(".{DISCOGS_HOST}")) {
        Some(parsed.to_string())
    } else {
        None
    }
}

/// Search-result links are placeholders rather than confirmed matches.
pub fn is_search_fallback_url(url: &str) -> bool {
    url.to_ascii_lowercase().contains("/search")
}

/// A safe URL that identifies a concrete release.
pub fn confirmed_discogs_url(raw: Option<&str>) -> Option<String> {
    raw.and_then(safe_discogs_url)
        .filter(|url| !is_search_fallback_url(url))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchQuality {
    Good,
    Medium,
    Poor,
}

impl MatchQuality {
    pub fn label(&self, url: Option<&str>) -> &'static str {
        match self {
            MatchQuality::Good => "Direct match",
            MatchQuality::Medium if url.is_some_and(is_search_fallback_url) => "Search",
            MatchQuality::Medium => "Found",
            MatchQuality::Poor => "No match",
        }
    }
}

pub fn match_quality(url: Option<&str>) -> MatchQuality {
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return MatchQuality::Poor;
    };
    let lower = url.to_ascii_lowercase();
    if lower.contains("/release/") || lower.contains("/master/") {
        MatchQuality::Good
    } else {
        MatchQuality::Medium
    }
}
