//! Canonical identity keys derived from free-text artist/album/track fields.
//!
//! Everything here is pure: empty input degrades to empty strings and the
//! key builders return `None` instead of failing.

use crate::models::{LookupKey, Track, TrackKey};
use once_cell::sync::Lazy;
use regex::Regex;

const KEY_DELIMITER: &str = "|";

// Any slash separates artists, "AC/DC" included.
static ARTIST_SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*(?:,|;|/|&|\+|\band\b|\s+(?:feat\.?|featuring|ft\.?|with|x)\s+)\s*",
    )
    .expect("artist separator pattern is valid")
});

static PARENTHESES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)").expect("parentheses pattern is valid"));
static BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[[^\]]*\]").expect("bracket pattern is valid"));
static BRACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\{[^}]*\}").expect("brace pattern is valid"));
static MARKETING_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*-\s*(?:remaster(?:ed)?|deluxe|expanded|anniversary|edition|remix|reissue)\b.*$",
    )
    .expect("marketing suffix pattern is valid")
});

/// First artist of a collaboration credit.
///
/// ```
/// use vinylmatch_core::normalize::primary_artist;
///
/// assert_eq!(primary_artist("Daft Punk, Pharrell Williams"), "Daft Punk");
/// assert_eq!(primary_artist("Artist A/Artist B"), "Artist A");
/// ```
pub fn primary_artist(artist: &str) -> String {
    let trimmed = artist.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match ARTIST_SEPARATORS.split(trimmed).next().map(str::trim) {
        Some(candidate) if !candidate.is_empty() => candidate.to_string(),
        _ => trimmed.to_string(),
    }
}

fn strip_bracketed_content(value: &str) -> String {
    let without_parens = PARENTHESES.replace_all(value, "");
    let without_brackets = BRACKETS.replace_all(&without_parens, "");
    BRACES.replace_all(&without_brackets, "").trim().to_string()
}

fn remove_marketing_suffix(value: &str) -> String {
    MARKETING_SUFFIX.replace(value, "").trim().to_string()
}

/// Search form of an album or track title.
///
/// ```
/// use vinylmatch_core::normalize::normalize_for_search;
///
/// assert_eq!(
///     normalize_for_search("Random Access Memories (Collector's Edition)"),
///     "Random Access Memories"
/// );
/// ```
pub fn normalize_for_search(value: &str) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    let substituted = value.replace('&', "and");
    remove_marketing_suffix(&strip_bracketed_content(&substituted))
}

fn key_part(value: &str) -> String {
    value.trim().to_lowercase()
}

fn year_part(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_default()
}

fn normalized_artist(artist: &str) -> String {
    key_part(&normalize_for_search(&primary_artist(artist)))
}

fn normalized_album(album: &str) -> String {
    key_part(&normalize_for_search(album))
}

/// Key shared by every track that should resolve to the same external release.
pub fn build_lookup_key(track: &Track) -> Option<LookupKey> {
    let artist = normalized_artist(&track.artist);
    let album = normalized_album(&track.album);
    if artist.is_empty() || album.is_empty() {
        return None;
    }
    let barcode = track.barcode.as_deref().map(key_part).unwrap_or_default();
    Some(LookupKey(
        [artist, album, year_part(track.release_year), barcode].join(KEY_DELIMITER),
    ))
}

/// Key identifying one rendered row.
///
/// A provider track id wins; otherwise the absolute position is folded in so
/// repeated songs on one playlist stay distinct.
pub fn build_track_key(track: &Track, index: Option<usize>) -> TrackKey {
    if let Some(id) = track.spotify_track_id.as_deref().filter(|id| !id.is_empty()) {
        return TrackKey(format!("id:{id}"));
    }
    let idx = match index {
        Some(i) => format!("idx:{i}"),
        None => "idx:-1".to_string(),
    };
    TrackKey(
        [
            idx,
            key_part(&primary_artist(&track.artist)),
            normalized_album(&track.album),
            key_part(&normalize_for_search(&track.track_name)),
            year_part(track.release_year),
        ]
        .join(KEY_DELIMITER),
    )
}

/// `artist|album|year` grouping used for curation.
pub fn build_album_key(track: &Track) -> String {
    [
        normalized_artist(&track.artist),
        normalized_album(&track.album),
        year_part(track.release_year),
    ]
    .join(KEY_DELIMITER)
}

/// `artist|album` key of the persisted library-state cache.
pub fn library_key(artist: &str, album: &str) -> Option<String> {
    let artist = normalized_artist(artist);
    let album = normalized_album(album);
    if artist.is_empty() || album.is_empty() {
        return None;
    }
    Some(format!("{artist}{KEY_DELIMITER}{album}"))
}
