//! Paginated playlist aggregation and its on-disk cache.
//!
//! Chunks are written into the aggregate by absolute offset, so pages may
//! arrive in any order. Every merge is persisted per playlist, and a bounded
//! recency index decides which cached playlists survive.

use crate::config::PlaylistCacheConfig;
use crate::library_cache::{system_clock, Clock};
use crate::models::{AggregatedPlaylist, PlaylistChunk, RecentPlaylist};
use crate::storage::{read_json, remove_quietly, write_json, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

pub const RECENTS_KEY: &str = "vm:recentPlaylists";
pub const CACHE_INDEX_KEY: &str = "vm:playlistCacheIndex";
pub const VIEW_MODE_KEY: &str = "vm:playlistViewMode";
const CACHE_KEY_PREFIX: &str = "vm:playlistCache:";

const UNKNOWN_PLAYLIST_NAME: &str = "Unknown playlist";

/// Largest aggregate a single playlist may grow to.
pub const MAX_PLAYLIST_TRACKS: usize = 100_000;

/// Whether a page of `count` tracks at `offset` fits a playlist of
/// `known_len` slots (when known) and the global ceiling.
pub fn offset_in_bounds(offset: usize, count: usize, known_len: Option<usize>) -> bool {
    let fits = offset
        .checked_add(count)
        .is_some_and(|end| end <= MAX_PLAYLIST_TRACKS);
    fits && known_len.map_or(true, |len| offset <= len)
}

pub fn cache_key_for(id: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{id}")
}

/// Merges one fetched page into the aggregate.
///
/// - tracks land at `offset + i`; trailing empty slots are trimmed
/// - totals and paging come from the chunk when present, else are inferred
/// - an empty page for a known playlist keeps the previous tracks and paging
/// - while a hole remains below the highest loaded slot, `next_offset`
///   points at the hole
/// - a page whose offset lies past the known playlist length is dropped
pub fn merge_chunk(
    id: &str,
    chunk: &PlaylistChunk,
    existing: Option<&AggregatedPlaylist>,
) -> AggregatedPlaylist {
    let existing = existing.filter(|prev| prev.id == id);
    let items = &chunk.tracks;
    let offset = chunk.offset.unwrap_or(0);
    let known_len = chunk
        .total_tracks
        .or(existing.map(|prev| prev.total_tracks))
        .map(|total| total.max(existing.map_or(0, |prev| prev.tracks.len())));
    if !offset_in_bounds(offset, items.len(), known_len) {
        tracing::warn!(
            playlist = id,
            offset,
            count = items.len(),
            "ignoring playlist chunk outside the playlist bounds"
        );
        return existing.cloned().unwrap_or_else(|| AggregatedPlaylist {
            id: id.to_string(),
            playlist_name: UNKNOWN_PLAYLIST_NAME.to_string(),
            has_more: true,
            ..AggregatedPlaylist::default()
        });
    }
    let end = offset + items.len();
    let total = chunk
        .total_tracks
        .or(existing.map(|prev| prev.total_tracks))
        .unwrap_or(end);

    let mut merged = AggregatedPlaylist {
        id: id.to_string(),
        playlist_name: chunk
            .playlist_name
            .clone()
            .or_else(|| existing.map(|prev| prev.playlist_name.clone()))
            .unwrap_or_else(|| UNKNOWN_PLAYLIST_NAME.to_string()),
        playlist_cover_url: chunk
            .playlist_cover_url
            .clone()
            .or_else(|| existing.and_then(|prev| prev.playlist_cover_url.clone())),
        playlist_url: chunk
            .playlist_url
            .clone()
            .or_else(|| existing.and_then(|prev| prev.playlist_url.clone())),
        total_tracks: total,
        tracks: existing.map(|prev| prev.tracks.clone()).unwrap_or_default(),
        next_offset: chunk.next_offset.unwrap_or(total.min(end)),
        has_more: chunk.has_more.unwrap_or(match chunk.next_offset {
            Some(next) => next < total,
            None => end < total,
        }),
    };

    if items.is_empty() {
        if let Some(prev) = existing {
            merged.next_offset = prev.next_offset;
            merged.has_more = prev.has_more;
            return merged;
        }
    }

    if merged.tracks.len() < end {
        merged.tracks.resize(end, None);
    }
    for (i, track) in items.iter().enumerate() {
        merged.tracks[offset + i] = Some(track.clone());
    }
    while matches!(merged.tracks.last(), Some(None)) {
        merged.tracks.pop();
    }

    let loaded = merged.loaded_prefix();
    if loaded < merged.tracks.len() {
        merged.next_offset = loaded;
        merged.has_more = true;
    } else {
        if merged.next_offset < loaded {
            merged.next_offset = loaded;
            merged.has_more = loaded < merged.total_tracks;
        }
        if !merged.has_more && merged.tracks.len() < merged.total_tracks {
            merged.has_more = true;
            merged.next_offset = merged.tracks.len();
        }
    }
    merged
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheIndexEntry {
    pub id: String,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Grid,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::List => "list",
            ViewMode::Grid => "grid",
        }
    }
}

impl FromStr for ViewMode {
    type Err = std::convert::Infallible;

    /// Anything but "grid" is the list view.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("grid") {
            ViewMode::Grid
        } else {
            ViewMode::List
        })
    }
}

/// Persisted playlist aggregates, recency index, recents list and view mode.
pub struct PlaylistStore {
    store: Arc<dyn KeyValueStore>,
    policy: PlaylistCacheConfig,
    clock: Clock,
}

impl PlaylistStore {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: PlaylistCacheConfig) -> Self {
        Self::with_clock(store, policy, system_clock())
    }

    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        policy: PlaylistCacheConfig,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    /// Merge, persist the aggregate, refresh the index and the recents list.
    pub fn store_chunk(
        &self,
        id: &str,
        chunk: &PlaylistChunk,
        existing: Option<&AggregatedPlaylist>,
    ) -> AggregatedPlaylist {
        let merged = merge_chunk(id, chunk, existing);
        self.write_cached(&merged);
        self.upsert_recent(&merged);
        tracing::debug!(
            playlist = id,
            loaded = merged.tracks.len(),
            total = merged.total_tracks,
            has_more = merged.has_more,
            "stored playlist chunk"
        );
        merged
    }

    /// Cached aggregate for `id`, or for the most recently updated playlist.
    pub fn read_cached(&self, id: Option<&str>) -> Option<AggregatedPlaylist> {
        let target = match id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.read_cache_index().into_iter().next()?.id,
        };
        let mut cached: AggregatedPlaylist =
            read_json(self.store.as_ref(), &cache_key_for(&target))?;
        cached.id = target;
        Some(cached)
    }

    pub fn write_cached(&self, aggregate: &AggregatedPlaylist) {
        if aggregate.id.is_empty() {
            return;
        }
        write_json(self.store.as_ref(), &cache_key_for(&aggregate.id), aggregate);
        self.touch_cache_index(&aggregate.id);
    }

    /// Drops one cached playlist, or every cached playlist when `id` is `None`.
    pub fn clear_cached(&self, id: Option<&str>) {
        match id {
            Some(id) => {
                remove_quietly(self.store.as_ref(), &cache_key_for(id));
                let index: Vec<_> = self
                    .read_cache_index()
                    .into_iter()
                    .filter(|entry| entry.id != id)
                    .collect();
                write_json(self.store.as_ref(), CACHE_INDEX_KEY, &index);
            }
            None => {
                for entry in self.read_cache_index() {
                    remove_quietly(self.store.as_ref(), &cache_key_for(&entry.id));
                }
                remove_quietly(self.store.as_ref(), CACHE_INDEX_KEY);
            }
        }
    }

    pub fn read_cache_index(&self) -> Vec<CacheIndexEntry> {
        read_json::<Vec<CacheIndexEntry>>(self.store.as_ref(), CACHE_INDEX_KEY)
            .unwrap_or_default()
            .into_iter()
            .filter(|entry| !entry.id.is_empty())
            .collect()
    }

    fn touch_cache_index(&self, id: &str) {
        let mut index: Vec<_> = self
            .read_cache_index()
            .into_iter()
            .filter(|entry| entry.id != id)
            .collect();
        index.insert(
            0,
            CacheIndexEntry {
                id: id.to_string(),
                updated_at: (self.clock)(),
            },
        );
        let max = self.policy.max_playlists.max(1);
        if index.len() > max {
            for evicted in index.split_off(max) {
                tracing::debug!(playlist = %evicted.id, "evicting cached playlist");
                remove_quietly(self.store.as_ref(), &cache_key_for(&evicted.id));
            }
        }
        write_json(self.store.as_ref(), CACHE_INDEX_KEY, &index);
    }

    pub fn read_recents(&self) -> Vec<RecentPlaylist> {
        read_json(self.store.as_ref(), RECENTS_KEY).unwrap_or_default()
    }

    /// Moves the playlist to the front of the recents list.
    pub fn upsert_recent(&self, aggregate: &AggregatedPlaylist) -> Vec<RecentPlaylist> {
        if aggregate.id.is_empty() {
            return self.read_recents();
        }
        let mut recents: Vec<_> = self
            .read_recents()
            .into_iter()
            .filter(|item| item.id != aggregate.id)
            .collect();
        recents.insert(
            0,
            RecentPlaylist {
                id: aggregate.id.clone(),
                name: aggregate.playlist_name.clone(),
                cover_url: aggregate.playlist_cover_url.clone(),
                track_count: Some(aggregate.total_tracks),
            },
        );
        recents.truncate(self.policy.max_recents.max(1));
        write_json(self.store.as_ref(), RECENTS_KEY, &recents);
        recents
    }

    pub fn view_mode(&self) -> ViewMode {
        match self.store.get(VIEW_MODE_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_default(),
            Ok(None) => ViewMode::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read view mode");
                ViewMode::default()
            }
        }
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        if let Err(e) = self.store.set(VIEW_MODE_KEY, mode.as_str()) {
            tracing::warn!(error = %e, "failed to persist view mode");
        }
    }
}
