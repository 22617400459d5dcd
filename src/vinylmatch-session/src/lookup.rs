//! Deduplicated, batched Discogs lookups.
//!
//! Every row gets a [`TrackKey`]; rows that describe the same release share a
//! [`LookupKey`]. Only one request per lookup key is ever in flight, and its
//! result fans out to every row that asked for it.

use crate::{lock, SharedPlaylist};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use vinylmatch_core::backend::Backend;
use vinylmatch_core::config::LookupConfig;
use vinylmatch_core::models::{
    DiscogsStatus, LookupKey, LookupRequest, LookupResult, Track, TrackKey,
};
use vinylmatch_core::normalize::{
    build_lookup_key, build_track_key, normalize_for_search, primary_artist,
};
use vinylmatch_core::registry::TrackRegistry;
use vinylmatch_core::urls::{is_search_fallback_url, safe_discogs_url};

#[derive(Debug, Clone)]
struct PendingLookup {
    key: TrackKey,
    index: usize,
    track: Track,
    lookup_key: Option<LookupKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Alias {
    key: TrackKey,
    index: usize,
}

/// A row a resolution is applied to. Either part may be missing when the
/// backend answered without echoing it.
#[derive(Debug, Clone)]
struct Target {
    key: Option<TrackKey>,
    index: Option<usize>,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<PendingLookup>,
    requested: HashSet<TrackKey>,
    completed: HashSet<TrackKey>,
    processing: bool,
    aliases: HashMap<LookupKey, Vec<Alias>>,
    results: HashMap<LookupKey, Option<String>>,
    in_flight: HashSet<LookupKey>,
    lookup_key_by_track: HashMap<TrackKey, LookupKey>,
    urls_found: bool,
    /// Bumped by `reset`; batches started under an older generation are
    /// discarded when they return.
    generation: u64,
}

impl QueueState {
    fn add_alias(&mut self, lookup_key: &LookupKey, key: &TrackKey, index: usize) {
        let aliases = self.aliases.entry(lookup_key.clone()).or_default();
        if !aliases.iter().any(|alias| &alias.key == key) {
            aliases.push(Alias {
                key: key.clone(),
                index,
            });
        }
    }

    /// Records the outcome and returns the rows it must be applied to.
    fn resolve(
        &mut self,
        key: Option<TrackKey>,
        index: Option<usize>,
        lookup_key: Option<LookupKey>,
        url: Option<String>,
    ) -> Vec<Target> {
        let lookup_key = lookup_key.or_else(|| {
            key.as_ref()
                .and_then(|k| self.lookup_key_by_track.get(k).cloned())
        });
        let aliases = lookup_key
            .as_ref()
            .and_then(|lk| self.aliases.remove(lk))
            .filter(|aliases| !aliases.is_empty());

        let targets: Vec<Target> = match aliases {
            Some(aliases) => aliases
                .into_iter()
                .map(|alias| Target {
                    key: Some(alias.key),
                    index: Some(alias.index),
                })
                .collect(),
            None => vec![Target { key, index }],
        };

        for target in &targets {
            if let Some(key) = &target.key {
                self.requested.remove(key);
                self.completed.insert(key.clone());
                self.lookup_key_by_track.remove(key);
            }
        }
        if let Some(lk) = lookup_key {
            self.in_flight.remove(&lk);
            self.results.insert(lk, url.clone());
        }
        if url.is_some() {
            self.urls_found = true;
        }
        targets
    }

    /// Returns a failed batch's keys to the unrequested state.
    fn release(&mut self, batch: &[PendingLookup]) {
        for item in batch {
            self.requested.remove(&item.key);
            self.lookup_key_by_track.remove(&item.key);
            if let Some(lk) = &item.lookup_key {
                if let Some(aliases) = self.aliases.remove(lk) {
                    for alias in aliases {
                        self.requested.remove(&alias.key);
                        self.lookup_key_by_track.remove(&alias.key);
                    }
                }
                self.in_flight.remove(lk);
            }
        }
    }
}

/// Counters from one run of [`LookupQueue::process`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub batches: usize,
    pub failed_batches: usize,
    pub resolved: usize,
    pub found: usize,
}

pub struct LookupQueue {
    backend: Arc<dyn Backend>,
    registry: Arc<TrackRegistry>,
    playlist: SharedPlaylist,
    config: LookupConfig,
    state: Mutex<QueueState>,
}

impl std::fmt::Debug for LookupQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("LookupQueue")
            .field("queued", &state.queue.len())
            .field("in_flight", &state.in_flight.len())
            .field("resolved", &state.results.len())
            .field("processing", &state.processing)
            .finish()
    }
}

/// Clears the processing flag however `process` exits.
struct ProcessingGuard<'a> {
    queue: &'a LookupQueue,
    generation: u64,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.queue.state();
        if state.generation == self.generation {
            state.processing = false;
        }
    }
}

impl LookupQueue {
    pub fn new(
        backend: Arc<dyn Backend>,
        registry: Arc<TrackRegistry>,
        playlist: SharedPlaylist,
        config: LookupConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            playlist,
            config,
            state: Mutex::new(QueueState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        lock(&self.state)
    }

    /// Registers lookups for `tracks`, which sit at `start_index..` in the
    /// playlist. Returns how many new requests were queued.
    ///
    /// Rows with a confirmed Discogs URL, and rows whose lookup key already
    /// resolved this session, are applied right away.
    pub fn enqueue(&self, start_index: usize, tracks: &[Track]) -> usize {
        let mut queued = 0;
        let mut immediate = Vec::new();
        {
            let mut state = self.state();
            for (offset, track) in tracks.iter().enumerate() {
                let index = start_index + offset;
                let key = build_track_key(track, Some(index));
                let lookup_key = build_lookup_key(track);
                if let Some(lk) = &lookup_key {
                    state.lookup_key_by_track.insert(key.clone(), lk.clone());
                    state.add_alias(lk, &key, index);
                }

                let existing = track.discogs_album_url.as_deref().and_then(safe_discogs_url);
                if let Some(url) = existing.filter(|url| !is_search_fallback_url(url)) {
                    let targets =
                        state.resolve(Some(key), Some(index), lookup_key, Some(url.clone()));
                    immediate.push((targets, Some(url)));
                    continue;
                }

                let known = lookup_key
                    .as_ref()
                    .and_then(|lk| state.results.get(lk).cloned());
                if let Some(url) = known {
                    let targets = state.resolve(Some(key), Some(index), lookup_key, url.clone());
                    immediate.push((targets, url));
                    continue;
                }

                if state.completed.contains(&key) || state.requested.contains(&key) {
                    continue;
                }
                state.requested.insert(key.clone());
                if let Some(lk) = &lookup_key {
                    if !state.in_flight.insert(lk.clone()) {
                        continue;
                    }
                }
                state.queue.push_back(PendingLookup {
                    key,
                    index,
                    track: track.clone(),
                    lookup_key,
                });
                queued += 1;
            }
        }
        for (targets, url) in immediate {
            self.apply(&targets, url.as_deref());
        }
        tracing::debug!(start_index, rows = tracks.len(), queued, "enqueued discogs lookups");
        queued
    }

    /// Drains the queue in sequential batches. A second caller while a drain
    /// is running returns immediately with an empty report.
    pub async fn process(&self) -> ProcessReport {
        let mut report = ProcessReport::default();
        let generation = {
            let mut state = self.state();
            if state.processing {
                return report;
            }
            state.processing = true;
            state.generation
        };
        let _guard = ProcessingGuard {
            queue: self,
            generation,
        };

        loop {
            let batch = {
                let mut state = self.state();
                if state.generation != generation {
                    break;
                }
                let mut batch = Vec::with_capacity(self.config.batch_size);
                while batch.len() < self.config.batch_size.max(1) {
                    let Some(candidate) = state.queue.pop_front() else {
                        break;
                    };
                    if state.completed.contains(&candidate.key) {
                        continue;
                    }
                    batch.push(candidate);
                }
                batch
            };
            if batch.is_empty() {
                break;
            }

            let requests: Vec<LookupRequest> = batch.iter().map(to_request).collect();
            report.batches += 1;
            let mut cache_only = false;
            match self.backend.discogs_batch(&requests).await {
                Ok(results) => {
                    cache_only = !results.is_empty() && results.iter().all(|r| r.cache_hit);
                    for result in results {
                        if let Some(found) = self.apply_result(result, Some(generation)) {
                            report.resolved += 1;
                            if found {
                                report.found += 1;
                            }
                        }
                    }
                    self.release_unanswered(&batch, generation);
                }
                Err(e) => {
                    tracing::warn!(error = %e, size = batch.len(), "discogs batch failed");
                    report.failed_batches += 1;
                    let mut state = self.state();
                    if state.generation == generation {
                        state.release(&batch);
                    }
                }
            }

            let more = {
                let state = self.state();
                state.generation == generation && !state.queue.is_empty()
            };
            if !more {
                break;
            }
            let delay = if cache_only {
                self.config.cache_batch_delay_ms
            } else {
                self.config.batch_delay_ms
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        tracing::debug!(
            batches = report.batches,
            failed = report.failed_batches,
            resolved = report.resolved,
            found = report.found,
            "discogs queue drained"
        );
        report
    }

    /// Applies a result from a manual search through the same fan-out as a
    /// batch result.
    pub fn mark_result(&self, key: &TrackKey, index: Option<usize>, url: Option<&str>) {
        self.apply_result(
            LookupResult {
                key: Some(key.clone()),
                index,
                lookup_key: None,
                url: url.map(str::to_string),
                cache_hit: false,
            },
            None,
        );
    }

    /// Clears all lookup state; in-flight batches are ignored when they return.
    pub fn reset(&self) {
        let mut state = self.state();
        let generation = state.generation.wrapping_add(1);
        *state = QueueState {
            generation,
            ..QueueState::default()
        };
    }

    /// Whether any lookup found a URL since the last call.
    pub fn take_urls_found(&self) -> bool {
        std::mem::take(&mut self.state().urls_found)
    }

    pub fn is_processing(&self) -> bool {
        self.state().processing
    }

    pub fn queued(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_in_flight(&self, lookup_key: &LookupKey) -> bool {
        self.state().in_flight.contains(lookup_key)
    }

    /// `Some(None)` means the lookup resolved without a match.
    pub fn result_for(&self, lookup_key: &LookupKey) -> Option<Option<String>> {
        self.state().results.get(lookup_key).cloned()
    }

    /// Returns `Some(found)` when the result was applied, `None` when it was
    /// stale or carried no identity.
    fn apply_result(&self, result: LookupResult, generation: Option<u64>) -> Option<bool> {
        let url = result.url.as_deref().and_then(safe_discogs_url);
        if result.url.is_some() && url.is_none() {
            tracing::warn!(key = ?result.key, "discarding non-discogs url from lookup");
        }
        let targets = {
            let mut state = self.state();
            if generation.is_some_and(|g| g != state.generation) {
                return None;
            }
            if result.key.is_none() && result.index.is_none() && result.lookup_key.is_none() {
                return None;
            }
            state.resolve(result.key, result.index, result.lookup_key, url.clone())
        };
        self.apply(&targets, url.as_deref());
        Some(url.is_some())
    }

    // Rows the backend silently skipped go back to unrequested.
    fn release_unanswered(&self, batch: &[PendingLookup], generation: u64) {
        let mut state = self.state();
        if state.generation != generation {
            return;
        }
        let unanswered: Vec<PendingLookup> = batch
            .iter()
            .filter(|item| !state.completed.contains(&item.key))
            .cloned()
            .collect();
        if !unanswered.is_empty() {
            tracing::debug!(count = unanswered.len(), "backend skipped lookups");
            state.release(&unanswered);
        }
    }

    fn apply(&self, targets: &[Target], url: Option<&str>) {
        let status = if url.is_some() {
            DiscogsStatus::Found
        } else {
            DiscogsStatus::NotFound
        };
        let mut playlist = lock(&self.playlist);
        for target in targets {
            let mut row_key = target.key.clone();
            if let (Some(index), Some(aggregate)) = (target.index, playlist.as_mut()) {
                if let Some(track) = aggregate.track_mut(index) {
                    track.discogs_album_url = url.map(str::to_string);
                    track.discogs_status = status;
                    if row_key.is_none() {
                        row_key = Some(build_track_key(track, Some(index)));
                    }
                }
            }
            if let Some(key) = row_key {
                self.registry.apply_discogs_state(&key, status, url);
            }
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn to_request(item: &PendingLookup) -> LookupRequest {
    LookupRequest {
        key: item.key.clone(),
        index: item.index,
        lookup_key: item.lookup_key.clone(),
        artist: non_empty(primary_artist(&item.track.artist)),
        album: non_empty(normalize_for_search(&item.track.album)),
        release_year: item.track.release_year,
        track: non_empty(normalize_for_search(&item.track.track_name)),
        barcode: item.track.barcode.clone().filter(|b| !b.trim().is_empty()),
    }
}
