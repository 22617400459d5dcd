//! One open playlist and everything hanging off it.
//!
//! `Session` is the explicit context object: the backend, the row registry,
//! the lookup queue, the library cache and the playlist store all live here,
//! and `reset()` is the single way to start over.

use crate::lookup::{LookupQueue, ProcessReport};
use crate::polling::{LoginPoll, PollSettings};
use crate::view::TrackView;
use crate::{lock, SharedPlaylist};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use vinylmatch_core::backend::{Backend, BackendError, WishlistAddOutcome};
use vinylmatch_core::chunk_store::{PlaylistStore, ViewMode};
use vinylmatch_core::config::Config;
use vinylmatch_core::curation::{build_curation_queue, CurationItem};
use vinylmatch_core::library_cache::LibraryCache;
use vinylmatch_core::models::{
    AggregatedPlaylist, DiscogsAccountStatus, DiscogsStatus, ExtractedAlbum, LibraryState,
    PlaylistChunk, RecentPlaylist, SearchQuery, Track, TrackKey, WishlistPage,
};
use vinylmatch_core::normalize::{
    build_track_key, library_key, normalize_for_search, primary_artist,
};
use vinylmatch_core::registry::TrackRegistry;
use vinylmatch_core::storage::KeyValueStore;
use vinylmatch_core::urls::safe_discogs_url;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("no playlist is open")]
    NoPlaylist,
    #[error("no track at position {0}")]
    NoTrack(usize),
    #[error("track at position {0} has no Discogs link")]
    NoDiscogsUrl(usize),
    #[error("please connect Discogs first")]
    NotLoggedIn,
    #[error("conflict: release is not in your wantlist")]
    ConflictNotMember,
    #[error("conflict while adding to wantlist; refresh the Discogs status")]
    ConflictUnknown,
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WantlistOutcome {
    Added,
    /// The backend refused with a conflict and the release is already a member.
    AlreadyPresent,
}

/// What one library-status refresh did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryRefresh {
    pub from_cache: usize,
    pub requested_urls: usize,
    pub updated: usize,
}

/// A rendered row that links to Discogs.
struct LinkedRow {
    key: TrackKey,
    url: String,
    library_key: Option<String>,
}

pub struct Session {
    backend: Arc<dyn Backend>,
    view: Arc<dyn TrackView>,
    registry: Arc<TrackRegistry>,
    lookups: LookupQueue,
    library: Mutex<LibraryCache>,
    playlists: PlaylistStore,
    playlist: SharedPlaylist,
    account: Mutex<Option<DiscogsAccountStatus>>,
    page_size: usize,
    library_status_limit: usize,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("playlist", &self.current().map(|p| p.id))
            .field("lookups", &self.lookups)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Session {
    pub fn new(
        backend: Arc<dyn Backend>,
        view: Arc<dyn TrackView>,
        store: Arc<dyn KeyValueStore>,
        config: &Config,
    ) -> Self {
        let registry = Arc::new(TrackRegistry::new());
        let playlist: SharedPlaylist = Arc::new(Mutex::new(None));
        let lookups = LookupQueue::new(
            backend.clone(),
            registry.clone(),
            playlist.clone(),
            config.lookup.clone(),
        );
        Self {
            library: Mutex::new(LibraryCache::load(
                store.clone(),
                config.library_cache.clone(),
            )),
            playlists: PlaylistStore::new(store, config.playlist_cache.clone()),
            backend,
            view,
            registry,
            lookups,
            playlist,
            account: Mutex::new(None),
            page_size: config.playlist_cache.page_size.max(1),
            library_status_limit: config.lookup.library_status_limit.max(1),
        }
    }

    pub fn lookups(&self) -> &LookupQueue {
        &self.lookups
    }

    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    pub fn playlists(&self) -> &PlaylistStore {
        &self.playlists
    }

    /// Snapshot of the open playlist.
    pub fn current(&self) -> Option<AggregatedPlaylist> {
        lock(&self.playlist).clone()
    }

    pub fn account(&self) -> Option<DiscogsAccountStatus> {
        lock(&self.account).clone()
    }

    pub fn is_logged_in(&self) -> bool {
        lock(&self.account).as_ref().is_some_and(|a| a.logged_in)
    }

    /// Drops the open playlist, every row and all lookup state.
    pub fn reset(&self) {
        self.lookups.reset();
        self.registry.clear();
        self.view.clear();
        *lock(&self.playlist) = None;
    }

    /// Opens a playlist: cached rows first, then the first page from the
    /// backend. A failed fetch is only an error when nothing was cached.
    pub async fn open_playlist(&self, id: &str) -> SessionResult<AggregatedPlaylist> {
        self.reset();
        let cached = self.playlists.read_cached(Some(id));
        if let Some(cached) = &cached {
            tracing::debug!(playlist = id, rows = cached.tracks.len(), "showing cached playlist");
            *lock(&self.playlist) = Some(cached.clone());
            self.rerender();
        }

        match self.backend.fetch_playlist_chunk(id, 0, self.page_size).await {
            Ok(chunk) => {
                self.apply_chunk(id, &chunk);
                self.rerender();
            }
            Err(e) if cached.is_some() => {
                tracing::warn!(playlist = id, error = %e, "refresh failed; keeping cached playlist");
            }
            Err(e) => return Err(e.into()),
        }

        let runs = self.loaded_runs(None);
        for (start, tracks) in runs {
            self.lookups.enqueue(start, &tracks);
        }
        self.drain_lookups().await;
        self.current().ok_or(SessionError::NoPlaylist)
    }

    /// Fetches the page at `next_offset`. Returns the number of rows added.
    pub async fn load_more(&self) -> SessionResult<usize> {
        let (id, offset, has_more) = {
            let guard = lock(&self.playlist);
            let aggregate = guard.as_ref().ok_or(SessionError::NoPlaylist)?;
            (aggregate.id.clone(), aggregate.next_offset, aggregate.has_more)
        };
        if !has_more {
            return Ok(0);
        }

        let chunk = self
            .backend
            .fetch_playlist_chunk(&id, offset, self.page_size)
            .await?;
        if self.current().map(|p| p.id) != Some(id.clone()) {
            tracing::debug!(playlist = %id, "playlist changed while loading; dropping page");
            return Ok(0);
        }
        let start = chunk.offset.unwrap_or(offset);
        let added = chunk.tracks.len();
        self.apply_chunk(&id, &chunk);

        let runs = self.loaded_runs(Some(start..start + added));
        for (run_start, tracks) in &runs {
            self.render_rows(*run_start, tracks);
        }
        for (run_start, tracks) in runs {
            self.lookups.enqueue(run_start, &tracks);
        }
        self.drain_lookups().await;
        Ok(added)
    }

    /// Keeps loading pages until the backend reports no more.
    pub async fn load_all(&self) -> SessionResult<usize> {
        let mut total = 0;
        loop {
            let before = self.current().map(|p| p.next_offset);
            let added = self.load_more().await?;
            total += added;
            let after = self.current();
            let Some(after) = after else { break };
            if !after.has_more {
                break;
            }
            if added == 0 && before == Some(after.next_offset) {
                tracing::warn!(next_offset = after.next_offset, "paging made no progress");
                break;
            }
        }
        Ok(total)
    }

    /// Re-renders every loaded row and reapplies known state.
    pub fn rerender(&self) {
        self.registry.clear();
        self.view.clear();
        for (start, tracks) in self.loaded_runs(None) {
            self.render_rows(start, &tracks);
        }
        self.apply_cached_library_states();
    }

    pub async fn refresh_discogs_status(&self) -> SessionResult<DiscogsAccountStatus> {
        let status = self.backend.discogs_status().await?;
        let identity = status
            .logged_in
            .then(|| status.username.clone().or_else(|| status.name.clone()))
            .flatten();
        let invalidated = lock(&self.library).bind_identity(identity.as_deref());
        *lock(&self.account) = Some(status.clone());
        if invalidated || !status.logged_in {
            self.clear_library_badges();
        }
        tracing::info!(
            logged_in = status.logged_in,
            user = status.display_name(),
            "discogs status refreshed"
        );
        Ok(status)
    }

    /// Updates wantlist/collection badges. Cached states apply immediately;
    /// only unknown URLs are sent to the backend, at most
    /// `library_status_limit` per call.
    pub async fn refresh_library_statuses(&self) -> SessionResult<LibraryRefresh> {
        let mut refresh = LibraryRefresh::default();
        if !self.is_logged_in() {
            return Ok(refresh);
        }
        let rows = self.linked_rows();
        if rows.is_empty() {
            return Ok(refresh);
        }

        let mut pending: Vec<&LinkedRow> = Vec::new();
        {
            let library = lock(&self.library);
            for row in &rows {
                match row.library_key.as_deref().and_then(|k| library.get(k)) {
                    Some(state) => {
                        self.registry.apply_library_state(&row.key, state);
                        refresh.from_cache += 1;
                    }
                    None => pending.push(row),
                }
            }
        }

        let mut seen = HashSet::new();
        let urls: Vec<String> = pending
            .iter()
            .filter(|row| seen.insert(row.url.as_str()))
            .map(|row| row.url.clone())
            .take(self.library_status_limit)
            .collect();
        if urls.is_empty() {
            return Ok(refresh);
        }
        refresh.requested_urls = urls.len();

        let flags = self.backend.library_status(&urls).await?;
        let states: HashMap<String, LibraryState> = flags
            .iter()
            .filter_map(|f| safe_discogs_url(&f.url).map(|url| (url, f.state())))
            .collect();
        let requested: HashSet<&str> = urls.iter().map(String::as_str).collect();

        let mut library = lock(&self.library);
        for row in pending {
            if !requested.contains(row.url.as_str()) {
                continue;
            }
            let state = states.get(&row.url).copied().unwrap_or(LibraryState::Absent);
            self.registry.apply_library_state(&row.key, state);
            if let Some(key) = &row.library_key {
                library.set(key, state);
            }
            refresh.updated += 1;
        }
        library.flush();
        tracing::debug!(
            cached = refresh.from_cache,
            requested = refresh.requested_urls,
            updated = refresh.updated,
            "library statuses refreshed"
        );
        Ok(refresh)
    }

    /// Adds the row's release to the wantlist. A conflict is resolved by
    /// asking whether the release is already a member.
    pub async fn add_to_wantlist(&self, index: usize) -> SessionResult<WantlistOutcome> {
        if !self.is_logged_in() {
            return Err(SessionError::NotLoggedIn);
        }
        let track = self.track_at(index)?;
        let url = track
            .discogs_album_url
            .as_deref()
            .and_then(safe_discogs_url)
            .ok_or(SessionError::NoDiscogsUrl(index))?;

        match self.backend.wishlist_add(&url).await? {
            WishlistAddOutcome::Added => {
                self.remember_library_state(index, &track, LibraryState::Wantlist);
                Ok(WantlistOutcome::Added)
            }
            WishlistAddOutcome::Conflict => match self.check_membership(&url).await {
                Some(state) if state.is_member() => {
                    self.remember_library_state(index, &track, LibraryState::Wantlist);
                    Ok(WantlistOutcome::AlreadyPresent)
                }
                Some(_) => Err(SessionError::ConflictNotMember),
                None => Err(SessionError::ConflictUnknown),
            },
        }
    }

    /// Manual single-track search. A miss only marks the row not-found when
    /// it had no link before.
    pub async fn search_track(&self, index: usize) -> SessionResult<Option<String>> {
        let track = self.track_at(index)?;
        let key = build_track_key(&track, Some(index));
        let artist = primary_artist(&track.artist);
        let query = SearchQuery {
            artist: if artist.is_empty() {
                track.artist.clone()
            } else {
                artist
            },
            album: normalize_for_search(&track.album),
            release_year: track.release_year,
            track: normalize_for_search(&track.track_name),
        };

        let found = match self.backend.discogs_search(&query).await {
            Ok(url) => url.as_deref().and_then(safe_discogs_url),
            Err(e) => {
                if track.discogs_album_url.is_none() {
                    self.lookups.mark_result(&key, Some(index), None);
                }
                return Err(e.into());
            }
        };

        match &found {
            Some(url) => {
                self.lookups.mark_result(&key, Some(index), Some(url.as_str()));
                self.persist_current();
                if let Err(e) = self.refresh_library_statuses().await {
                    tracing::warn!(error = %e, "library refresh after search failed");
                }
            }
            None if track.discogs_album_url.is_none() => {
                self.lookups.mark_result(&key, Some(index), None);
            }
            None => {}
        }
        Ok(found)
    }

    /// Logs in with a personal access token and refreshes everything that
    /// depends on the account.
    pub async fn login(&self, token: &str) -> SessionResult<DiscogsAccountStatus> {
        self.backend.discogs_login(token).await?;
        let status = self.refresh_discogs_status().await?;
        if let Err(e) = self.refresh_library_statuses().await {
            tracing::warn!(error = %e, "library refresh after login failed");
        }
        Ok(status)
    }

    /// Logs out locally even when the backend call fails.
    pub async fn logout(&self) {
        if let Err(e) = self.backend.discogs_logout().await {
            tracing::warn!(error = %e, "discogs logout request failed");
        }
        *lock(&self.account) = Some(DiscogsAccountStatus::default());
        {
            let mut library = lock(&self.library);
            library.bind_identity(None);
            library.clear();
            library.flush();
        }
        self.clear_library_badges();
    }

    pub async fn start_oauth(&self) -> SessionResult<String> {
        Ok(self.backend.oauth_start().await?)
    }

    /// Starts waiting for a browser login to land.
    pub fn poll_login(&self, settings: PollSettings) -> LoginPoll {
        LoginPoll::spawn(self.backend.clone(), settings)
    }

    pub async fn wishlist(&self, page: u32, limit: u32) -> SessionResult<WishlistPage> {
        Ok(self.backend.wishlist(page.max(1), limit.max(1)).await?)
    }

    pub async fn extract_albums(&self) -> SessionResult<Vec<ExtractedAlbum>> {
        let tracks = self.loaded_tracks()?;
        Ok(self.backend.extract_albums(&tracks).await?)
    }

    pub fn curation_queue(&self, missing_only: bool) -> SessionResult<Vec<CurationItem>> {
        let tracks = self.loaded_tracks()?;
        Ok(build_curation_queue(&tracks, missing_only))
    }

    pub fn recents(&self) -> Vec<RecentPlaylist> {
        self.playlists.read_recents()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.playlists.view_mode()
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        self.playlists.set_view_mode(mode);
    }

    /// Drops cached playlists and, when `id` is `None`, the library cache too.
    pub fn clear_cache(&self, id: Option<&str>) {
        self.playlists.clear_cached(id);
        if id.is_none() {
            let mut library = lock(&self.library);
            library.clear();
            library.flush();
        }
    }

    async fn drain_lookups(&self) -> ProcessReport {
        let report = self.lookups.process().await;
        if report.resolved > 0 {
            self.persist_current();
        }
        if self.lookups.take_urls_found() {
            if let Err(e) = self.refresh_library_statuses().await {
                tracing::warn!(error = %e, "library status refresh failed");
            }
        }
        report
    }

    fn apply_chunk(&self, id: &str, chunk: &PlaylistChunk) {
        let mut guard = lock(&self.playlist);
        let merged = self.playlists.store_chunk(id, chunk, guard.as_ref());
        *guard = Some(merged);
    }

    fn persist_current(&self) {
        if let Some(aggregate) = self.current() {
            self.playlists.write_cached(&aggregate);
        }
    }

    fn render_rows(&self, start: usize, tracks: &[Track]) {
        for (offset, track) in tracks.iter().enumerate() {
            let index = start + offset;
            let handle = self.view.render_row(index, track);
            self.registry
                .register(build_track_key(track, Some(index)), handle);
        }
    }

    /// Contiguous runs of loaded rows, optionally limited to `range`.
    fn loaded_runs(&self, range: Option<std::ops::Range<usize>>) -> Vec<(usize, Vec<Track>)> {
        let guard = lock(&self.playlist);
        let Some(aggregate) = guard.as_ref() else {
            return Vec::new();
        };
        let mut runs: Vec<(usize, Vec<Track>)> = Vec::new();
        for (index, track) in aggregate.loaded_tracks() {
            if range.as_ref().is_some_and(|r| !r.contains(&index)) {
                continue;
            }
            match runs.last_mut() {
                Some((start, tracks)) if *start + tracks.len() == index => {
                    tracks.push(track.clone())
                }
                _ => runs.push((index, vec![track.clone()])),
            }
        }
        runs
    }

    fn loaded_tracks(&self) -> SessionResult<Vec<Track>> {
        let guard = lock(&self.playlist);
        let aggregate = guard.as_ref().ok_or(SessionError::NoPlaylist)?;
        Ok(aggregate.loaded_tracks().map(|(_, t)| t.clone()).collect())
    }

    fn track_at(&self, index: usize) -> SessionResult<Track> {
        let guard = lock(&self.playlist);
        let aggregate = guard.as_ref().ok_or(SessionError::NoPlaylist)?;
        aggregate
            .track(index)
            .cloned()
            .ok_or(SessionError::NoTrack(index))
    }

    fn linked_rows(&self) -> Vec<LinkedRow> {
        let guard = lock(&self.playlist);
        let Some(aggregate) = guard.as_ref() else {
            return Vec::new();
        };
        aggregate
            .loaded_tracks()
            .filter_map(|(index, track)| {
                let url = track.discogs_album_url.as_deref().and_then(safe_discogs_url)?;
                Some(LinkedRow {
                    key: build_track_key(track, Some(index)),
                    url,
                    library_key: library_key(&track.artist, &track.album),
                })
            })
            .collect()
    }

    fn apply_cached_library_states(&self) {
        if !self.is_logged_in() {
            return;
        }
        let rows = self.linked_rows();
        let library = lock(&self.library);
        for row in rows {
            if let Some(state) = row.library_key.as_deref().and_then(|k| library.get(k)) {
                self.registry.apply_library_state(&row.key, state);
            }
        }
    }

    fn clear_library_badges(&self) {
        for row in self.linked_rows() {
            self.registry.apply_library_state(&row.key, LibraryState::Absent);
        }
    }

    fn remember_library_state(&self, index: usize, track: &Track, state: LibraryState) {
        if let Some(key) = library_key(&track.artist, &track.album) {
            let mut library = lock(&self.library);
            library.set(&key, state);
            library.flush();
        }
        self.registry
            .apply_library_state(&build_track_key(track, Some(index)), state);
    }

    /// `None` when membership could not be determined.
    async fn check_membership(&self, url: &str) -> Option<LibraryState> {
        let urls = vec![url.to_string()];
        match self.backend.library_status(&urls).await {
            Ok(flags) => Some(
                flags
                    .iter()
                    .find(|f| safe_discogs_url(&f.url).as_deref() == Some(url))
                    .map(|f| f.state())
                    .unwrap_or(LibraryState::Absent),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "wantlist membership check failed");
                None
            }
        }
    }

    /// Current Discogs status of a row, as the renderer would show it.
    pub fn discogs_status(&self, index: usize) -> Option<DiscogsStatus> {
        lock(&self.playlist)
            .as_ref()
            .and_then(|p| p.track(index))
            .map(|t| t.discogs_status)
    }
}
