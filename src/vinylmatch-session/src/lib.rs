pub mod lookup;
pub mod polling;
pub mod session;
pub mod view;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use vinylmatch_core::models::AggregatedPlaylist;

pub use lookup::{LookupQueue, ProcessReport};
pub use polling::{LoginPoll, PollOutcome, PollSettings};
pub use session::{LibraryRefresh, Session, SessionError, SessionResult, WantlistOutcome};
pub use view::{HeadlessView, RowSnapshot, RowView, TrackView};

/// The currently open playlist, shared by the session and the lookup queue.
pub type SharedPlaylist = Arc<Mutex<Option<AggregatedPlaylist>>>;

/// Locks a mutex, carrying on with the inner value if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
