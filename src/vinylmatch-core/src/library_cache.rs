//! Persisted wantlist/collection membership cache.
//!
//! Keyed by the normalized `artist|album` pair and bound to the Discogs
//! identity it was filled for. Mutations only mark the cache dirty; callers
//! `flush()` once per batch of updates.

use crate::config::LibraryCacheConfig;
use crate::models::LibraryState;
use crate::storage::{read_json, write_json, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const LIBRARY_CACHE_KEY: &str = "vm:discogsLibraryCache";

const CACHE_FORMAT_VERSION: u32 = 1;

/// Milliseconds since the Unix epoch.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub state: LibraryState,
    pub expires_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCache {
    version: u32,
    #[serde(default)]
    identity: Option<String>,
    #[serde(default)]
    entries: HashMap<String, CacheEntry>,
}

pub struct LibraryCache {
    store: Arc<dyn KeyValueStore>,
    policy: LibraryCacheConfig,
    clock: Clock,
    identity: Option<String>,
    entries: HashMap<String, CacheEntry>,
    dirty: bool,
}

impl std::fmt::Debug for LibraryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryCache")
            .field("identity", &self.identity)
            .field("entries", &self.entries.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl LibraryCache {
    pub fn load(store: Arc<dyn KeyValueStore>, policy: LibraryCacheConfig) -> Self {
        Self::load_with_clock(store, policy, system_clock())
    }

    /// Loads the persisted blob, silently dropping entries that already expired.
    pub fn load_with_clock(
        store: Arc<dyn KeyValueStore>,
        policy: LibraryCacheConfig,
        clock: Clock,
    ) -> Self {
        let now = clock();
        let persisted: Option<PersistedCache> = read_json(store.as_ref(), LIBRARY_CACHE_KEY);
        let (identity, entries) = match persisted {
            Some(p) if p.version == CACHE_FORMAT_VERSION => {
                let live: HashMap<_, _> = p
                    .entries
                    .into_iter()
                    .filter(|(_, entry)| entry.expires_at > now)
                    .collect();
                (p.identity, live)
            }
            Some(p) => {
                tracing::info!(
                    found = p.version,
                    expected = CACHE_FORMAT_VERSION,
                    "discarding library cache with unknown format"
                );
                (None, HashMap::new())
            }
            None => (None, HashMap::new()),
        };
        tracing::debug!(entries = entries.len(), "loaded library cache");
        let mut cache = Self {
            store,
            policy,
            clock,
            identity,
            entries,
            dirty: false,
        };
        cache.evict_overflow();
        cache
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Binds the cache to an account. A different account (or a disconnect)
    /// wipes every entry and persists the empty cache immediately.
    ///
    /// Returns `true` when the cache was invalidated.
    pub fn bind_identity(&mut self, identity: Option<&str>) -> bool {
        let identity = identity.map(str::trim).filter(|id| !id.is_empty());
        if self.identity.as_deref() == identity {
            return false;
        }
        tracing::info!(
            previous = ?self.identity,
            current = ?identity,
            "discogs identity changed; invalidating library cache"
        );
        self.identity = identity.map(str::to_string);
        self.entries.clear();
        self.dirty = true;
        self.flush();
        true
    }

    /// Known state for `key`; `None` means a fetch is needed.
    pub fn get(&self, key: &str) -> Option<LibraryState> {
        let now = (self.clock)();
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.state)
    }

    pub fn set(&mut self, key: &str, state: LibraryState) {
        let now = (self.clock)();
        let expires_at = now.saturating_add(self.ttl_millis(state));
        self.entries
            .insert(key.to_string(), CacheEntry { state, expires_at });
        self.dirty = true;
        self.evict_overflow();
    }

    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.dirty = true;
        }
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persists pending mutations. Storage failures are logged and the cache
    /// stays dirty so a later flush can retry.
    pub fn flush(&mut self) -> bool {
        if !self.dirty {
            return true;
        }
        let now = (self.clock)();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let persisted = PersistedCache {
            version: CACHE_FORMAT_VERSION,
            identity: self.identity.clone(),
            entries: self.entries.clone(),
        };
        if write_json(self.store.as_ref(), LIBRARY_CACHE_KEY, &persisted) {
            self.dirty = false;
            tracing::debug!(entries = self.entries.len(), "persisted library cache");
            true
        } else {
            false
        }
    }

    fn ttl_millis(&self, state: LibraryState) -> u64 {
        let secs = match state {
            LibraryState::Owned | LibraryState::Wantlist => self.policy.member_ttl_secs,
            LibraryState::Absent => self.policy.absent_ttl_secs,
        };
        secs.saturating_mul(1000)
    }

    // Soonest-to-expire entries go first.
    fn evict_overflow(&mut self) {
        let max = self.policy.max_entries.max(1);
        if self.entries.len() <= max {
            return;
        }
        let mut by_expiry: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.expires_at))
            .collect();
        by_expiry.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let overflow = self.entries.len() - max;
        for (key, _) in by_expiry.into_iter().take(overflow) {
            self.entries.remove(&key);
        }
        self.dirty = true;
        tracing::debug!(evicted = overflow, "evicted library cache entries");
    }
}
