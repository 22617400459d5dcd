use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one rendered playlist row.
///
/// Stable across re-renders of the same logical track; not comparable
/// across different playlists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackKey(pub String);

impl TrackKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Identity of one external (artist, album, year, barcode) lookup.
///
/// Many rows of a playlist can share a single lookup key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LookupKey(pub String);

impl LookupKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LookupKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Discogs match state of a single track row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscogsStatus {
    #[default]
    Pending,
    Found,
    NotFound,
}

impl DiscogsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscogsStatus::Pending => "pending",
            DiscogsStatus::Found => "found",
            DiscogsStatus::NotFound => "not-found",
        }
    }
}

/// Membership of a release in the connected Discogs account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryState {
    Owned,
    Wantlist,
    #[serde(rename = "none")]
    Absent,
}

impl LibraryState {
    /// Collection membership wins over the wantlist.
    pub fn from_flags(in_wishlist: bool, in_collection: bool) -> Self {
        if in_collection {
            LibraryState::Owned
        } else if in_wishlist {
            LibraryState::Wantlist
        } else {
            LibraryState::Absent
        }
    }

    pub fn is_member(&self) -> bool {
        !matches!(self, LibraryState::Absent)
    }

    pub fn label(&self) -> Option<&'static str> {
        match self {
            LibraryState::Owned => Some("In collection"),
            LibraryState::Wantlist => Some("In wantlist"),
            LibraryState::Absent => None,
        }
    }
}

/// One playlist row as delivered by the backend and enriched client-side.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(default)]
    pub track_name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify_track_id: Option<String>,
    #[serde(default)]
    pub discogs_album_url: Option<String>,
    #[serde(default)]
    pub discogs_status: DiscogsStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hhv_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon_url: Option<String>,
}

impl Track {
    pub fn new(
        track_name: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
    ) -> Self {
        Self {
            track_name: track_name.into(),
            artist: artist.into(),
            album: album.into(),
            ..Self::default()
        }
    }

    pub fn with_release_year(mut self, year: i32) -> Self {
        self.release_year = Some(year);
        self
    }
}

/// A single page of playlist tracks, validated at the backend boundary.
///
/// Optional fields stay `None` when the backend omitted them so that the
/// merge can fall back to previously known values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistChunk {
    #[serde(default)]
    pub playlist_name: Option<String>,
    #[serde(default)]
    pub playlist_cover_url: Option<String>,
    #[serde(default)]
    pub playlist_url: Option<String>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub total_tracks: Option<usize>,
    #[serde(default)]
    pub next_offset: Option<usize>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

/// The accumulated, paginated playlist held in memory and on disk.
///
/// `tracks` is indexed by absolute playlist position; `None` marks a slot
/// whose page has not been fetched yet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPlaylist {
    pub id: String,
    pub playlist_name: String,
    #[serde(default)]
    pub playlist_cover_url: Option<String>,
    #[serde(default)]
    pub playlist_url: Option<String>,
    pub total_tracks: usize,
    #[serde(default)]
    pub tracks: Vec<Option<Track>>,
    pub next_offset: usize,
    pub has_more: bool,
}

impl AggregatedPlaylist {
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index).and_then(Option::as_ref)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index).and_then(Option::as_mut)
    }

    /// Index of the first unfetched slot below the highest loaded position.
    pub fn first_gap(&self) -> Option<usize> {
        self.tracks.iter().position(Option::is_none)
    }

    pub fn is_gap_free(&self) -> bool {
        self.first_gap().is_none()
    }

    /// Length of the contiguous loaded prefix.
    pub fn loaded_prefix(&self) -> usize {
        self.first_gap().unwrap_or(self.tracks.len())
    }

    pub fn loaded_tracks(&self) -> impl Iterator<Item = (usize, &Track)> {
        self.tracks
            .iter()
            .enumerate()
            .filter_map(|(idx, track)| track.as_ref().map(|t| (idx, t)))
    }
}

/// Entry of the bounded "recently viewed" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentPlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub track_count: Option<usize>,
}

/// Connection state of the Discogs account as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscogsAccountStatus {
    #[serde(default)]
    pub logged_in: bool,
    #[serde(default)]
    pub oauth_configured: bool,
    #[serde(default)]
    pub oauth_session: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl DiscogsAccountStatus {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("Discogs")
    }
}

/// One item of the batch lookup request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub key: TrackKey,
    pub index: usize,
    pub lookup_key: Option<LookupKey>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub release_year: Option<i32>,
    pub track: Option<String>,
    pub barcode: Option<String>,
}

/// One item of the batch lookup response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupResult {
    pub key: Option<TrackKey>,
    pub index: Option<usize>,
    pub lookup_key: Option<LookupKey>,
    pub url: Option<String>,
    pub cache_hit: bool,
}

/// Single-track search body for the manual "search again" action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub artist: String,
    pub album: String,
    pub release_year: Option<i32>,
    pub track: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub release_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WishlistPage {
    pub items: Vec<WishlistItem>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

/// Wantlist/collection flags for one Discogs URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFlags {
    pub url: String,
    pub in_wishlist: bool,
    pub in_collection: bool,
}

impl LibraryFlags {
    pub fn state(&self) -> LibraryState {
        LibraryState::from_flags(self.in_wishlist, self.in_collection)
    }
}

/// Album group returned by the album extraction endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedAlbum {
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub track_count: usize,
    #[serde(default)]
    pub track_indices: Vec<usize>,
    #[serde(default)]
    pub spotify_album_url: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
}
