use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

const CURRENT_CONFIG_VERSION: u32 = 1;

/// Upper bound on lookups submitted per batch request.
pub const MAX_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub library_cache: LibraryCacheConfig,
    #[serde(default)]
    pub playlist_cache: PlaylistCacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            backend: BackendConfig::default(),
            lookup: LookupConfig::default(),
            library_cache: LibraryCacheConfig::default(),
            playlist_cache: PlaylistCacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Batching and pacing of Discogs lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Delay after a batch that was answered entirely from the server cache.
    #[serde(default = "default_cache_batch_delay_ms")]
    pub cache_batch_delay_ms: u64,
    /// Cap on distinct URLs per library-status request.
    #[serde(default = "default_library_status_limit")]
    pub library_status_limit: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            cache_batch_delay_ms: default_cache_batch_delay_ms(),
            library_status_limit: default_library_status_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryCacheConfig {
    #[serde(default = "default_library_cache_entries")]
    pub max_entries: usize,
    /// TTL for owned/wantlist states.
    #[serde(default = "default_member_ttl")]
    pub member_ttl_secs: u64,
    /// TTL for "not a member"; shorter because absence changes more often.
    #[serde(default = "default_absent_ttl")]
    pub absent_ttl_secs: u64,
}

impl Default for LibraryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_library_cache_entries(),
            member_ttl_secs: default_member_ttl(),
            absent_ttl_secs: default_absent_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistCacheConfig {
    #[serde(default = "default_max_playlists")]
    pub max_playlists: usize,
    #[serde(default = "default_max_recents")]
    pub max_recents: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for PlaylistCacheConfig {
    fn default() -> Self {
        Self {
            max_playlists: default_max_playlists(),
            max_recents: default_max_recents(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_stdout_enabled")]
    pub stdout: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stdout: default_stdout_enabled(),
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("backend.base_url '{value}' is not a valid URL: {reason}")]
    InvalidBaseUrl { value: String, reason: String },
    #[error("lookup.batch_size must be between 1 and {max}, got {found}")]
    BatchSize { found: usize, max: usize },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        let path = Self::config_path(dirs);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        Url::parse(&self.backend.base_url).map_err(|e| ValidationError::InvalidBaseUrl {
            value: self.backend.base_url.clone(),
            reason: e.to_string(),
        })?;
        if self.lookup.batch_size == 0 || self.lookup.batch_size > MAX_BATCH_SIZE {
            return Err(ValidationError::BatchSize {
                found: self.lookup.batch_size,
                max: MAX_BATCH_SIZE,
            });
        }
        if self.library_cache.max_entries == 0 {
            return Err(ValidationError::Zero {
                field: "library_cache.max_entries",
            });
        }
        if self.playlist_cache.max_playlists == 0 {
            return Err(ValidationError::Zero {
                field: "playlist_cache.max_playlists",
            });
        }
        if self.playlist_cache.page_size == 0 {
            return Err(ValidationError::Zero {
                field: "playlist_cache.page_size",
            });
        }
        Ok(())
    }
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_base_url() -> String {
    "http://localhost:8888/".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    3
}

fn default_batch_delay_ms() -> u64 {
    250
}

fn default_cache_batch_delay_ms() -> u64 {
    40
}

fn default_library_status_limit() -> usize {
    120
}

fn default_library_cache_entries() -> usize {
    2000
}

fn default_member_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_absent_ttl() -> u64 {
    12 * 60 * 60
}

fn default_max_playlists() -> usize {
    5
}

fn default_max_recents() -> usize {
    10
}

fn default_page_size() -> usize {
    50
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_stdout_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.max_log_files, 7);
        assert!(config.logging.stdout);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.lookup.batch_size, 3);
        assert_eq!(config.playlist_cache.max_recents, 10);
        assert!(config.library_cache.absent_ttl_secs < config.library_cache.member_ttl_secs);
    }

    #[test]
    fn invalid_version_rejected() {
        let mut config = Config::default();
        config.config_version = CURRENT_CONFIG_VERSION + 1;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn oversized_batch_rejected() {
        let mut config = Config::default();
        config.lookup.batch_size = MAX_BATCH_SIZE + 1;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::BatchSize { .. })
        ));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            base_url = "https://vinylmatch.example/"

            [lookup]
            batch_size = 5
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend.base_url, "https://vinylmatch.example/");
        assert_eq!(config.lookup.batch_size, 5);
        assert_eq!(config.lookup.batch_delay_ms, 250);
        assert_eq!(config.playlist_cache.max_playlists, 5);
    }

    #[test]
    fn bad_base_url_rejected() {
        let mut config = Config::default();
        config.backend.base_url = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBaseUrl { .. })
        ));
    }
}
