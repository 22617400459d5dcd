mod common;

use common::{page, test_config, track, FakeBackend};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use vinylmatch_core::chunk_store::{cache_key_for, ViewMode, RECENTS_KEY};
use vinylmatch_core::models::{DiscogsStatus, LibraryFlags, LibraryState, Track};
use vinylmatch_core::storage::{KeyValueStore, MemoryStore};
use vinylmatch_session::{
    HeadlessView, PollOutcome, PollSettings, Session, SessionError, WantlistOutcome,
};

const DISCOVERY: &str = "https://www.discogs.com/release/1-Daft-Punk-Discovery";
const MEZZANINE: &str = "https://www.discogs.com/master/2-Massive-Attack-Mezzanine";

fn four_tracks() -> Vec<Track> {
    vec![
        track("One More Time", "Daft Punk", "Discovery"),
        track("Digital Love", "Daft Punk", "Discovery"),
        track("Teardrop", "Massive Attack", "Mezzanine"),
        track("Angel", "Massive Attack", "Mezzanine"),
    ]
}

/// Two pages of two tracks each, with both releases known to Discogs.
fn paged_backend() -> FakeBackend {
    let tracks = four_tracks();
    FakeBackend::new()
        .with_page(0, page(0, tracks[..2].to_vec(), 4))
        .with_page(2, page(2, tracks[2..].to_vec(), 4))
        .with_album_url("Discovery", DISCOVERY)
        .with_album_url("Mezzanine", MEZZANINE)
}

struct Harness {
    backend: Arc<FakeBackend>,
    view: Arc<HeadlessView>,
    store: Arc<MemoryStore>,
    session: Session,
}

fn harness(backend: FakeBackend) -> Harness {
    let backend = Arc::new(backend);
    let view = Arc::new(HeadlessView::new());
    let store = Arc::new(MemoryStore::new());
    let session = Session::new(backend.clone(), view.clone(), store.clone(), &test_config());
    Harness {
        backend,
        view,
        store,
        session,
    }
}

#[tokio::test(start_paused = true)]
async fn open_playlist_renders_first_page_and_resolves_lookups() {
    let h = harness(paged_backend());

    let aggregate = h.session.open_playlist("pl").await.unwrap();

    assert_eq!(aggregate.playlist_name, "Crate Digging");
    assert_eq!(aggregate.total_tracks, 4);
    assert!(aggregate.has_more);
    assert_eq!(h.view.len(), 2);
    assert_eq!(h.session.discogs_status(0), Some(DiscogsStatus::Found));
    assert_eq!(h.view.row(1).unwrap().discogs_url.as_deref(), Some(DISCOVERY));

    let cached = h.store.get(&cache_key_for("pl")).unwrap().unwrap();
    assert!(cached.contains(DISCOVERY));
    assert!(h.store.get(RECENTS_KEY).unwrap().is_some());
    assert_eq!(h.session.recents()[0].id, "pl");
}

#[tokio::test(start_paused = true)]
async fn load_all_fills_the_playlist_without_gaps() {
    let h = harness(paged_backend());
    h.session.open_playlist("pl").await.unwrap();

    let added = h.session.load_all().await.unwrap();

    assert_eq!(added, 2);
    let aggregate = h.session.current().unwrap();
    assert!(aggregate.is_gap_free());
    assert_eq!(aggregate.tracks.len(), 4);
    assert!(!aggregate.has_more);
    assert_eq!(h.view.len(), 4);
    assert_eq!(h.view.row(3).unwrap().discogs_url.as_deref(), Some(MEZZANINE));
    assert_eq!(h.backend.batch_count(), 2);

    assert_eq!(h.session.load_more().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn cached_playlist_survives_a_failed_refresh() {
    let h = harness(paged_backend());
    h.session.open_playlist("pl").await.unwrap();

    h.backend.fail_playlist.store(true, Ordering::SeqCst);
    let reopened = h.session.open_playlist("pl").await.unwrap();

    assert_eq!(reopened.tracks.len(), 2);
    assert_eq!(h.view.len(), 2);
    assert_eq!(h.view.row(0).unwrap().discogs_status, DiscogsStatus::Found);
}

#[tokio::test(start_paused = true)]
async fn failed_open_without_cache_is_an_error() {
    let h = harness(paged_backend());
    h.backend.fail_playlist.store(true, Ordering::SeqCst);

    let err = h.session.open_playlist("pl").await.unwrap_err();

    assert!(matches!(err, SessionError::Backend(_)));
    assert!(h.session.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn load_more_without_a_playlist_fails() {
    let h = harness(paged_backend());
    assert!(matches!(
        h.session.load_more().await,
        Err(SessionError::NoPlaylist)
    ));
}

#[tokio::test(start_paused = true)]
async fn library_badges_follow_the_logged_in_account() {
    let h = harness(
        paged_backend()
            .logged_in_as("digger")
            .with_library(DISCOVERY, false, true),
    );
    h.session.refresh_discogs_status().await.unwrap();

    h.session.open_playlist("pl").await.unwrap();

    assert_eq!(h.backend.library_call_count(), 1);
    assert_eq!(h.view.row(0).unwrap().library, LibraryState::Owned);
    assert_eq!(h.view.row(1).unwrap().library, LibraryState::Owned);

    let refresh = h.session.refresh_library_statuses().await.unwrap();
    assert_eq!(refresh.from_cache, 2);
    assert_eq!(refresh.requested_urls, 0);
    assert_eq!(h.backend.library_call_count(), 1);

    h.session.logout().await;
    assert!(!h.session.is_logged_in());
    assert_eq!(h.view.row(0).unwrap().library, LibraryState::Absent);
}

#[tokio::test(start_paused = true)]
async fn unanswered_urls_are_remembered_as_absent() {
    let h = harness(paged_backend().logged_in_as("digger"));
    h.session.refresh_discogs_status().await.unwrap();
    h.session.open_playlist("pl").await.unwrap();

    let refresh = h.session.refresh_library_statuses().await.unwrap();

    assert_eq!(refresh.from_cache, 2);
    assert_eq!(h.view.row(0).unwrap().library, LibraryState::Absent);
    assert_eq!(h.backend.library_calls.lock().unwrap()[0], vec![DISCOVERY.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn library_refresh_is_skipped_when_logged_out() {
    let h = harness(paged_backend().with_library(DISCOVERY, true, false));
    h.session.open_playlist("pl").await.unwrap();

    let refresh = h.session.refresh_library_statuses().await.unwrap();

    assert_eq!(refresh.requested_urls, 0);
    assert_eq!(h.backend.library_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn wantlist_add_requires_login() {
    let h = harness(paged_backend());
    h.session.open_playlist("pl").await.unwrap();

    assert!(matches!(
        h.session.add_to_wantlist(0).await,
        Err(SessionError::NotLoggedIn)
    ));
}

#[tokio::test(start_paused = true)]
async fn wantlist_add_marks_the_row() {
    let h = harness(paged_backend().logged_in_as("digger"));
    h.session.refresh_discogs_status().await.unwrap();
    h.session.open_playlist("pl").await.unwrap();

    let outcome = h.session.add_to_wantlist(1).await.unwrap();

    assert_eq!(outcome, WantlistOutcome::Added);
    assert_eq!(h.view.row(1).unwrap().library, LibraryState::Wantlist);
    assert_eq!(*h.backend.wishlist_adds.lock().unwrap(), vec![DISCOVERY.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn conflict_for_a_member_release_is_not_an_error() {
    let h = harness(paged_backend().logged_in_as("digger"));
    h.session.refresh_discogs_status().await.unwrap();
    h.session.open_playlist("pl").await.unwrap();
    assert_eq!(h.view.row(0).unwrap().library, LibraryState::Absent);

    h.backend.wishlist_conflict.store(true, Ordering::SeqCst);
    h.backend.library.lock().unwrap().insert(
        DISCOVERY.to_string(),
        LibraryFlags {
            url: DISCOVERY.to_string(),
            in_wishlist: true,
            in_collection: false,
        },
    );

    let outcome = h.session.add_to_wantlist(0).await.unwrap();

    assert_eq!(outcome, WantlistOutcome::AlreadyPresent);
    assert_eq!(h.view.row(0).unwrap().library, LibraryState::Wantlist);
}

#[tokio::test(start_paused = true)]
async fn conflict_for_an_owned_release_marks_the_row_wanted() {
    let h = harness(paged_backend().logged_in_as("digger"));
    h.session.refresh_discogs_status().await.unwrap();
    h.session.open_playlist("pl").await.unwrap();

    h.backend.wishlist_conflict.store(true, Ordering::SeqCst);
    h.backend.library.lock().unwrap().insert(
        DISCOVERY.to_string(),
        LibraryFlags {
            url: DISCOVERY.to_string(),
            in_wishlist: false,
            in_collection: true,
        },
    );

    let outcome = h.session.add_to_wantlist(0).await.unwrap();

    assert_eq!(outcome, WantlistOutcome::AlreadyPresent);
    assert_eq!(h.view.row(0).unwrap().library, LibraryState::Wantlist);
}

#[tokio::test(start_paused = true)]
async fn conflict_for_a_non_member_release_is_reported() {
    let h = harness(paged_backend().logged_in_as("digger"));
    h.session.refresh_discogs_status().await.unwrap();
    h.session.open_playlist("pl").await.unwrap();
    h.backend.wishlist_conflict.store(true, Ordering::SeqCst);

    assert!(matches!(
        h.session.add_to_wantlist(0).await,
        Err(SessionError::ConflictNotMember)
    ));

    h.backend.fail_library.store(true, Ordering::SeqCst);
    assert!(matches!(
        h.session.add_to_wantlist(0).await,
        Err(SessionError::ConflictUnknown)
    ));
}

#[tokio::test(start_paused = true)]
async fn manual_search_links_a_missing_row() {
    let backend = FakeBackend::new().with_page(
        0,
        page(0, vec![track("Windowlicker", "Aphex Twin", "Windowlicker")], 1),
    );
    let h = harness(backend);
    h.session.open_playlist("pl").await.unwrap();
    assert_eq!(h.session.discogs_status(0), Some(DiscogsStatus::NotFound));

    *h.backend.search_url.lock().unwrap() = Some("https://www.discogs.com/release/42".into());
    let found = h.session.search_track(0).await.unwrap();

    assert_eq!(found.as_deref(), Some("https://www.discogs.com/release/42"));
    assert_eq!(h.session.discogs_status(0), Some(DiscogsStatus::Found));
    assert_eq!(h.view.row(0).unwrap().discogs_label(), "Direct match");
}

#[tokio::test(start_paused = true)]
async fn manual_search_miss_keeps_an_existing_link() {
    let h = harness(paged_backend());
    h.session.open_playlist("pl").await.unwrap();

    let found = h.session.search_track(0).await.unwrap();

    assert_eq!(found, None);
    assert_eq!(h.session.discogs_status(0), Some(DiscogsStatus::Found));
    assert!(matches!(
        h.session.search_track(9).await,
        Err(SessionError::NoTrack(9))
    ));
}

#[tokio::test(start_paused = true)]
async fn login_binds_the_account() {
    let h = harness(paged_backend());
    assert!(!h.session.is_logged_in());

    let status = h.session.login("token").await.unwrap();

    assert!(status.logged_in);
    assert_eq!(status.display_name(), "digger");
    assert!(h.session.is_logged_in());
    assert!(h.session.login("").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn login_poll_times_out_when_nobody_logs_in() {
    let h = harness(paged_backend());
    let poll = h.session.poll_login(PollSettings {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(3),
    });

    assert_eq!(poll.outcome().await, PollOutcome::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn login_poll_sees_a_browser_login() {
    let h = harness(paged_backend().logged_in_as("digger"));
    let poll = h.session.poll_login(PollSettings::default());

    match poll.outcome().await {
        PollOutcome::LoggedIn(status) => assert_eq!(status.username.as_deref(), Some("digger")),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn login_poll_can_be_cancelled() {
    let h = harness(paged_backend());
    let poll = h.session.poll_login(PollSettings::default());
    poll.cancel();

    assert_eq!(poll.outcome().await, PollOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn curation_and_album_extraction_use_loaded_rows() {
    let h = harness(paged_backend());
    assert!(matches!(
        h.session.curation_queue(false),
        Err(SessionError::NoPlaylist)
    ));
    h.session.open_playlist("pl").await.unwrap();
    h.session.load_all().await.unwrap();

    let queue = h.session.curation_queue(false).unwrap();
    assert_eq!(queue.len(), 2);
    let albums = h.session.extract_albums().await.unwrap();
    assert_eq!(albums.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn view_mode_and_cache_clearing_persist() {
    let h = harness(paged_backend());
    assert_eq!(h.session.view_mode(), ViewMode::List);
    h.session.set_view_mode(ViewMode::Grid);
    assert_eq!(h.session.view_mode(), ViewMode::Grid);

    h.session.open_playlist("pl").await.unwrap();
    h.session.clear_cache(Some("pl"));
    assert!(h.store.get(&cache_key_for("pl")).unwrap().is_none());
    assert!(h.session.playlists().read_cached(Some("pl")).is_none());
}

#[tokio::test(start_paused = true)]
async fn reset_drops_rows_and_playlist() {
    let h = harness(paged_backend());
    h.session.open_playlist("pl").await.unwrap();

    h.session.reset();

    assert!(h.session.current().is_none());
    assert!(h.view.is_empty());
    assert!(h.session.registry().is_empty());
}
