//! Row rendering seam.
//!
//! The session never touches widgets: it asks a [`TrackView`] for one
//! [`TrackHandle`] per row and pushes state changes through it.

use crate::lock;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use vinylmatch_core::models::{DiscogsStatus, LibraryState, Track};
use vinylmatch_core::registry::TrackHandle;
use vinylmatch_core::urls::match_quality;

pub trait TrackView: Send + Sync {
    /// Renders one row and returns the handle that updates it.
    fn render_row(&self, index: usize, track: &Track) -> Arc<dyn TrackHandle>;

    /// Called before a full re-render.
    fn clear(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSnapshot {
    pub index: usize,
    pub track_name: String,
    pub artist: String,
    pub album: String,
    pub discogs_status: DiscogsStatus,
    pub discogs_url: Option<String>,
    pub library: LibraryState,
}

impl RowSnapshot {
    pub fn discogs_label(&self) -> &'static str {
        match self.discogs_status {
            DiscogsStatus::Pending => "Searching",
            _ => match_quality(self.discogs_url.as_deref()).label(self.discogs_url.as_deref()),
        }
    }
}

#[derive(Debug, Clone)]
struct RowState {
    discogs_status: DiscogsStatus,
    discogs_url: Option<String>,
    library: LibraryState,
}

/// Headless row: remembers the last state pushed to it.
#[derive(Debug)]
pub struct RowView {
    index: usize,
    track_name: String,
    artist: String,
    album: String,
    state: Mutex<RowState>,
}

impl RowView {
    pub fn new(index: usize, track: &Track) -> Self {
        Self {
            index,
            track_name: track.track_name.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            state: Mutex::new(RowState {
                discogs_status: track.discogs_status,
                discogs_url: track.discogs_album_url.clone(),
                library: LibraryState::Absent,
            }),
        }
    }

    pub fn snapshot(&self) -> RowSnapshot {
        let state = lock(&self.state);
        RowSnapshot {
            index: self.index,
            track_name: self.track_name.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            discogs_status: state.discogs_status,
            discogs_url: state.discogs_url.clone(),
            library: state.library,
        }
    }
}

impl TrackHandle for RowView {
    fn set_discogs_state(&self, status: DiscogsStatus, url: Option<&str>) {
        let mut state = lock(&self.state);
        state.discogs_status = status;
        state.discogs_url = url.map(str::to_string);
    }

    fn set_library_state(&self, state: LibraryState) {
        lock(&self.state).library = state;
    }
}

/// [`TrackView`] that keeps its rows in memory, ordered by position.
#[derive(Debug, Default)]
pub struct HeadlessView {
    rows: Mutex<BTreeMap<usize, Arc<RowView>>>,
}

impl HeadlessView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<RowSnapshot> {
        lock(&self.rows).values().map(|row| row.snapshot()).collect()
    }

    pub fn row(&self, index: usize) -> Option<RowSnapshot> {
        lock(&self.rows).get(&index).map(|row| row.snapshot())
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrackView for HeadlessView {
    fn render_row(&self, index: usize, track: &Track) -> Arc<dyn TrackHandle> {
        let row = Arc::new(RowView::new(index, track));
        lock(&self.rows).insert(index, row.clone());
        row
    }

    fn clear(&self) {
        lock(&self.rows).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_tracks_pushed_state() {
        let view = HeadlessView::new();
        let handle = view.render_row(3, &Track::new("Teardrop", "Massive Attack", "Mezzanine"));
        assert_eq!(view.row(3).unwrap().discogs_label(), "Searching");

        handle.set_discogs_state(
            DiscogsStatus::Found,
            Some("https://www.discogs.com/release/1"),
        );
        handle.set_library_state(LibraryState::Owned);

        let row = view.row(3).unwrap();
        assert_eq!(row.discogs_status, DiscogsStatus::Found);
        assert_eq!(row.discogs_label(), "Direct match");
        assert_eq!(row.library.label(), Some("In collection"));
    }

    #[test]
    fn clear_drops_rows() {
        let view = HeadlessView::new();
        view.render_row(0, &Track::default());
        view.render_row(1, &Track::default());
        assert_eq!(view.len(), 2);
        view.clear();
        assert!(view.is_empty());
    }

    #[test]
    fn not_found_row_reads_no_match() {
        let view = HeadlessView::new();
        let handle = view.render_row(0, &Track::default());
        handle.set_discogs_state(DiscogsStatus::NotFound, None);
        assert_eq!(view.row(0).unwrap().discogs_label(), "No match");
    }
}
