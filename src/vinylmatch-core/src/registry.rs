//! Track key → live row handle mapping, rebuilt on every full render.

use crate::models::{DiscogsStatus, LibraryState, TrackKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Update sink for one rendered row.
///
/// Implementations own their view state; the registry never hands out the
/// track objects themselves, only these callbacks.
pub trait TrackHandle: Send + Sync {
    fn set_discogs_state(&self, state: DiscogsStatus, url: Option<&str>);

    /// `LibraryState::Absent` hides the badge.
    fn set_library_state(&self, state: LibraryState);
}

#[derive(Default)]
pub struct TrackRegistry {
    entries: Mutex<HashMap<TrackKey, Arc<dyn TrackHandle>>>,
}

impl std::fmt::Debug for TrackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Recovers the map when a panic elsewhere poisoned the lock.
    fn entries(&self) -> MutexGuard<'_, HashMap<TrackKey, Arc<dyn TrackHandle>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, key: TrackKey, handle: Arc<dyn TrackHandle>) {
        self.entries().insert(key, handle);
    }

    pub fn get(&self, key: &TrackKey) -> Option<Arc<dyn TrackHandle>> {
        self.entries().get(key).cloned()
    }

    /// Drops every handle so late results cannot reach discarded rows.
    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies a discogs state to the row if it is still registered.
    ///
    /// Returns `false` for orphaned keys.
    pub fn apply_discogs_state(&self, key: &TrackKey, state: DiscogsStatus, url: Option<&str>) -> bool {
        match self.get(key) {
            Some(handle) => {
                handle.set_discogs_state(state, url);
                true
            }
            None => {
                tracing::debug!(key = %key, "dropping discogs result for unregistered row");
                false
            }
        }
    }

    pub fn apply_library_state(&self, key: &TrackKey, state: LibraryState) -> bool {
        match self.get(key) {
            Some(handle) => {
                handle.set_library_state(state);
                true
            }
            None => false,
        }
    }
}
