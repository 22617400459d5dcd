pub mod backend;
pub mod chunk_store;
pub mod config;
pub mod curation;
pub mod library_cache;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod paths;
pub mod registry;
pub mod secrets;
pub mod storage;
pub mod urls;

pub use backend::{Backend, BackendError, BackendResult, WishlistAddOutcome};
pub use chunk_store::{merge_chunk, PlaylistStore, ViewMode};
pub use config::{
    BackendConfig, Config, ConfigError, LibraryCacheConfig, LogLevel, LoggingConfig,
    LookupConfig, PlaylistCacheConfig, ValidationError,
};
pub use library_cache::{CacheEntry, Clock, LibraryCache};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use models::{
    AggregatedPlaylist, DiscogsAccountStatus, DiscogsStatus, ExtractedAlbum, LibraryFlags,
    LibraryState, LookupKey, LookupRequest, LookupResult, PlaylistChunk, RecentPlaylist,
    SearchQuery, Track, TrackKey, WishlistItem, WishlistPage,
};
pub use paths::{AppDirs, DirsError};
pub use registry::{TrackHandle, TrackRegistry};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};

pub const APP_NAME: &str = "vinylmatch";
pub const APP_AUTHOR: &str = "VinylMatch";
pub const APP_QUALIFIER: &str = "io";
