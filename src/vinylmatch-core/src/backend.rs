use crate::models::{
    DiscogsAccountStatus, ExtractedAlbum, LibraryFlags, LookupRequest, LookupResult,
    PlaylistChunk, SearchQuery, Track, WishlistPage,
};
use thiserror::Error;

/// Failure categories of the VinylMatch REST backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {message}")]
    Network { message: String },
    #[error("backend responded with HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// The release is already on the wantlist (HTTP 409).
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("not logged in to Discogs")]
    NotAuthenticated,
    #[error("malformed backend payload: {message}")]
    Decode { message: String },
    #[error("invalid backend url: {message}")]
    InvalidUrl { message: String },
}

impl BackendError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Conflict { .. } => Some(409),
            BackendError::NotAuthenticated => Some(401),
            _ => None,
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Outcome of adding a release to the wantlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WishlistAddOutcome {
    Added,
    /// The backend reported a conflict; membership has not been verified yet.
    Conflict,
}

/// The REST collaborator the session talks to.
///
/// Implementations turn wire payloads into typed values; anything that does
/// not validate is a [`BackendError::Decode`].
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_playlist_chunk(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> BackendResult<PlaylistChunk>;

    /// Resolves a batch of lookups. Result order is not significant.
    async fn discogs_batch(&self, requests: &[LookupRequest]) -> BackendResult<Vec<LookupResult>>;

    /// Single-track search; `Ok(None)` when nothing matched.
    async fn discogs_search(&self, query: &SearchQuery) -> BackendResult<Option<String>>;

    async fn discogs_status(&self) -> BackendResult<DiscogsAccountStatus>;

    async fn discogs_login(&self, token: &str) -> BackendResult<()>;

    async fn discogs_logout(&self) -> BackendResult<()>;

    /// Starts the OAuth handshake and returns the authorize URL.
    async fn oauth_start(&self) -> BackendResult<String>;

    async fn wishlist(&self, page: u32, limit: u32) -> BackendResult<WishlistPage>;

    async fn wishlist_add(&self, url: &str) -> BackendResult<WishlistAddOutcome>;

    async fn library_status(&self, urls: &[String]) -> BackendResult<Vec<LibraryFlags>>;

    async fn extract_albums(&self, tracks: &[Track]) -> BackendResult<Vec<ExtractedAlbum>>;
}
