#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vinylmatch_core::backend::{Backend, BackendError, BackendResult, WishlistAddOutcome};
use vinylmatch_core::config::Config;
use vinylmatch_core::models::{
    DiscogsAccountStatus, ExtractedAlbum, LibraryFlags, LookupRequest, LookupResult,
    PlaylistChunk, SearchQuery, Track, WishlistPage,
};

/// Scriptable in-memory backend that records every call.
#[derive(Default)]
pub struct FakeBackend {
    /// Playlist pages keyed by offset.
    pub pages: Mutex<HashMap<usize, PlaylistChunk>>,
    pub fail_playlist: AtomicBool,
    /// Discogs URL per normalized album title.
    pub album_urls: Mutex<HashMap<String, String>>,
    pub cache_hits: AtomicBool,
    pub fail_next_batches: AtomicUsize,
    /// Simulated round trip of every batch request.
    pub batch_latency_ms: AtomicU64,
    pub batch_calls: Mutex<Vec<Vec<LookupRequest>>>,
    pub search_url: Mutex<Option<String>>,
    pub status: Mutex<DiscogsAccountStatus>,
    pub library: Mutex<HashMap<String, LibraryFlags>>,
    pub library_calls: Mutex<Vec<Vec<String>>>,
    pub wishlist_conflict: AtomicBool,
    pub wishlist_adds: Mutex<Vec<String>>,
    pub fail_library: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, offset: usize, chunk: PlaylistChunk) -> Self {
        self.pages.lock().unwrap().insert(offset, chunk);
        self
    }

    pub fn with_album_url(self, album: &str, url: &str) -> Self {
        self.album_urls
            .lock()
            .unwrap()
            .insert(album.to_string(), url.to_string());
        self
    }

    pub fn logged_in_as(self, username: &str) -> Self {
        *self.status.lock().unwrap() = DiscogsAccountStatus {
            logged_in: true,
            username: Some(username.to_string()),
            ..DiscogsAccountStatus::default()
        };
        self
    }

    pub fn with_library(self, url: &str, in_wishlist: bool, in_collection: bool) -> Self {
        self.library.lock().unwrap().insert(
            url.to_string(),
            LibraryFlags {
                url: url.to_string(),
                in_wishlist,
                in_collection,
            },
        );
        self
    }

    pub fn batch_count(&self) -> usize {
        self.batch_calls.lock().unwrap().len()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_calls
            .lock()
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect()
    }

    pub fn library_call_count(&self) -> usize {
        self.library_calls.lock().unwrap().len()
    }
}

fn network(message: &str) -> BackendError {
    BackendError::Network {
        message: message.into(),
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_playlist_chunk(
        &self,
        _playlist_id: &str,
        offset: usize,
        _limit: usize,
    ) -> BackendResult<PlaylistChunk> {
        if self.fail_playlist.load(Ordering::SeqCst) {
            return Err(network("playlist offline"));
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&offset)
            .cloned()
            .unwrap_or_else(|| PlaylistChunk {
                offset: Some(offset),
                ..PlaylistChunk::default()
            }))
    }

    async fn discogs_batch(&self, requests: &[LookupRequest]) -> BackendResult<Vec<LookupResult>> {
        self.batch_calls.lock().unwrap().push(requests.to_vec());
        let latency = self.batch_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let fail = self
            .fail_next_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(network("batch offline"));
        }
        let urls = self.album_urls.lock().unwrap();
        let cache_hit = self.cache_hits.load(Ordering::SeqCst);
        Ok(requests
            .iter()
            .map(|req| LookupResult {
                key: Some(req.key.clone()),
                index: Some(req.index),
                lookup_key: req.lookup_key.clone(),
                url: req.album.as_ref().and_then(|album| urls.get(album).cloned()),
                cache_hit,
            })
            .collect())
    }

    async fn discogs_search(&self, _query: &SearchQuery) -> BackendResult<Option<String>> {
        Ok(self.search_url.lock().unwrap().clone())
    }

    async fn discogs_status(&self) -> BackendResult<DiscogsAccountStatus> {
        Ok(self.status.lock().unwrap().clone())
    }

    async fn discogs_login(&self, token: &str) -> BackendResult<()> {
        if token.is_empty() {
            return Err(BackendError::NotAuthenticated);
        }
        let mut status = self.status.lock().unwrap();
        status.logged_in = true;
        status.username.get_or_insert_with(|| "digger".to_string());
        Ok(())
    }

    async fn discogs_logout(&self) -> BackendResult<()> {
        *self.status.lock().unwrap() = DiscogsAccountStatus::default();
        Ok(())
    }

    async fn oauth_start(&self) -> BackendResult<String> {
        Ok("https://www.discogs.com/oauth/authorize?oauth_token=abc".into())
    }

    async fn wishlist(&self, page: u32, limit: u32) -> BackendResult<WishlistPage> {
        Ok(WishlistPage {
            items: Vec::new(),
            total: 0,
            page,
            limit,
        })
    }

    async fn wishlist_add(&self, url: &str) -> BackendResult<WishlistAddOutcome> {
        self.wishlist_adds.lock().unwrap().push(url.to_string());
        if self.wishlist_conflict.load(Ordering::SeqCst) {
            Ok(WishlistAddOutcome::Conflict)
        } else {
            Ok(WishlistAddOutcome::Added)
        }
    }

    async fn library_status(&self, urls: &[String]) -> BackendResult<Vec<LibraryFlags>> {
        self.library_calls.lock().unwrap().push(urls.to_vec());
        if self.fail_library.load(Ordering::SeqCst) {
            return Err(network("library offline"));
        }
        let library = self.library.lock().unwrap();
        Ok(urls
            .iter()
            .filter_map(|url| library.get(url).cloned())
            .collect())
    }

    async fn extract_albums(&self, tracks: &[Track]) -> BackendResult<Vec<ExtractedAlbum>> {
        Ok(tracks
            .iter()
            .map(|t| ExtractedAlbum {
                album: t.album.clone(),
                artist: t.artist.clone(),
                track_count: 1,
                ..ExtractedAlbum::default()
            })
            .collect())
    }
}

pub fn track(name: &str, artist: &str, album: &str) -> Track {
    Track::new(name, artist, album)
}

pub fn page(offset: usize, tracks: Vec<Track>, total: usize) -> PlaylistChunk {
    let end = offset + tracks.len();
    PlaylistChunk {
        playlist_name: Some("Crate Digging".into()),
        tracks,
        offset: Some(offset),
        total_tracks: Some(total),
        next_offset: Some(end),
        has_more: Some(end < total),
        ..PlaylistChunk::default()
    }
}

/// Default config with two-track pages.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.playlist_cache.page_size = 2;
    config
}
