use anyhow::Result;
use clap::{Parser, Subcommand};
use http_backend::HttpBackend;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use vinylmatch_core::curation::CurationItem;
use vinylmatch_core::secrets::CredentialStore;
use vinylmatch_core::{
    init_logging, AppDirs, Config, FileStore, RecentPlaylist, ViewMode, WishlistItem,
};
use vinylmatch_session::{
    HeadlessView, PollOutcome, PollSettings, RowSnapshot, Session, WantlistOutcome,
};

#[derive(Debug, Parser)]
#[command(name = "vinylmatch", version, about = "Find vinyl for your playlists on Discogs")]
struct Cli {
    /// Backend base URL override (takes precedence over config)
    #[arg(long, global = true)]
    backend_url: Option<String>,
    /// Keyring profile for the stored Discogs token
    #[arg(long, global = true)]
    profile: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a playlist and print its rows with Discogs matches
    Playlist {
        id: String,
        /// Keep loading pages until the whole playlist is in
        #[arg(long)]
        all: bool,
    },
    /// Recently opened playlists
    Recents,
    /// Discogs connection status
    Status,
    /// Connect Discogs with a personal access token
    Login {
        /// Token to use; falls back to the one stored in the keyring
        #[arg(long)]
        token: Option<String>,
        /// Store the token in the keyring after a successful login
        #[arg(long)]
        save: bool,
    },
    /// Disconnect Discogs and forget the stored token
    Logout,
    /// Connect Discogs in the browser and wait for the login to land
    Oauth {
        #[arg(long, default_value_t = 20)]
        timeout_secs: u64,
    },
    /// Show the Discogs wantlist
    Wishlist {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 25)]
        limit: u32,
    },
    /// Add a playlist row's release to the wantlist
    Want(RowArgs),
    /// Search Discogs again for one playlist row
    Search(RowArgs),
    /// Group a playlist's tracks into albums
    Albums { playlist: String },
    /// Albums still missing shop or Discogs links
    Curation {
        playlist: String,
        #[arg(long)]
        missing_only: bool,
    },
    /// Local cache maintenance
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Show or set the preferred playlist layout
    ViewMode { mode: Option<String> },
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    /// Drop one cached playlist, or every cache when no id is given
    Clear {
        #[arg(long)]
        playlist: Option<String>,
    },
}

#[derive(Debug, Parser, Clone)]
struct RowArgs {
    playlist: String,
    /// Row number as printed by `vinylmatch playlist` (starting at 1)
    row: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
enum CommandError {
    #[error("no Discogs token given and none stored in the keyring")]
    MissingToken,
    #[error("row numbers start at 1")]
    ZeroRow,
}

impl RowArgs {
    fn index(&self) -> Result<usize, CommandError> {
        self.row.checked_sub(1).ok_or(CommandError::ZeroRow)
    }
}

/// An explicit token wins over the stored one; blank tokens count as missing.
fn pick_token(explicit: Option<String>, stored: Option<String>) -> Result<String, CommandError> {
    explicit
        .into_iter()
        .chain(stored)
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
        .ok_or(CommandError::MissingToken)
}

fn format_row(row: &RowSnapshot) -> String {
    let mut line = format!(
        "{:>4}. {} - {} [{}] {}",
        row.index + 1,
        row.artist,
        row.track_name,
        row.album,
        row.discogs_label()
    );
    if let Some(url) = &row.discogs_url {
        line.push_str(&format!(" <{url}>"));
    }
    if let Some(label) = row.library.label() {
        line.push_str(&format!(" ({label})"));
    }
    line
}

fn format_recent(recent: &RecentPlaylist) -> String {
    match recent.track_count {
        Some(count) => format!("{}  {} ({count} tracks)", recent.id, recent.name),
        None => format!("{}  {}", recent.id, recent.name),
    }
}

fn format_wishlist_item(item: &WishlistItem) -> String {
    let artist = item.artist.as_deref().unwrap_or("Unknown artist");
    let title = item.title.as_deref().unwrap_or("Untitled");
    let mut line = format!("{artist} - {title}");
    if let Some(year) = item.year {
        line.push_str(&format!(" ({year})"));
    }
    if let Some(url) = &item.url {
        line.push_str(&format!(" <{url}>"));
    }
    line
}

fn format_curation_item(item: &CurationItem) -> String {
    let missing: Vec<String> = item.missing.iter().map(ToString::to_string).collect();
    let missing = if missing.is_empty() {
        "complete".to_string()
    } else {
        format!("missing {}", missing.join(", "))
    };
    match item.release_year {
        Some(year) => format!("{} - {} ({year}): {missing}", item.artist, item.album),
        None => format!("{} - {}: {missing}", item.artist, item.album),
    }
}

struct App {
    session: Session,
    view: Arc<HeadlessView>,
    credentials: CredentialStore,
    profile: Option<String>,
}

impl App {
    fn new(config: &Config, dirs: &AppDirs, profile: Option<String>) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(&config.backend)?);
        let view = Arc::new(HeadlessView::new());
        let store = Arc::new(FileStore::new(dirs.storage_dir()));
        let session = Session::new(backend, view.clone(), store, config);
        Ok(Self {
            session,
            view,
            credentials: CredentialStore::new(),
            profile,
        })
    }

    /// Refreshes the account and, when disconnected, logs in with the stored
    /// token. Missing credentials or an unreachable status endpoint leave the
    /// session logged out.
    async fn connect(&self) {
        match self.session.refresh_discogs_status().await {
            Ok(status) if status.logged_in => return,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "discogs status unavailable");
                return;
            }
        }
        match self.credentials.discogs_token(self.profile.as_deref()) {
            Ok(Some(token)) => {
                if let Err(e) = self.session.login(&token).await {
                    tracing::warn!(error = %e, "stored discogs token was rejected");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "could not read discogs token"),
        }
    }

    async fn open(&self, playlist: &str, all: bool) -> Result<()> {
        self.connect().await;
        let aggregate = self.session.open_playlist(playlist).await?;
        if all {
            self.session.load_all().await?;
        }
        tracing::info!(
            playlist = %aggregate.id,
            loaded = self.view.len(),
            total = aggregate.total_tracks,
            "playlist ready"
        );
        Ok(())
    }

    fn print_rows(&self) {
        if let Some(aggregate) = self.session.current() {
            println!("{} ({} tracks)", aggregate.playlist_name, aggregate.total_tracks);
        }
        for row in self.view.rows() {
            println!("{}", format_row(&row));
        }
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Playlist { id, all } => {
                self.open(&id, all).await?;
                self.print_rows();
                if self.session.current().is_some_and(|p| p.has_more) {
                    println!("More rows available; pass --all to load everything.");
                }
            }
            Command::Recents => {
                let recents = self.session.recents();
                if recents.is_empty() {
                    println!("No recently opened playlists.");
                }
                for recent in &recents {
                    println!("{}", format_recent(recent));
                }
            }
            Command::Status => {
                self.connect().await;
                match self.session.account() {
                    Some(status) if status.logged_in => {
                        println!("Connected to Discogs as {}", status.display_name())
                    }
                    _ => println!("Discogs is not connected."),
                }
            }
            Command::Login { token, save } => {
                let stored = match self.credentials.discogs_token(self.profile.as_deref()) {
                    Ok(stored) => stored,
                    Err(e) => {
                        tracing::warn!(error = %e, "could not read discogs token");
                        None
                    }
                };
                let token = pick_token(token, stored)?;
                let status = self.session.login(&token).await?;
                if save {
                    self.credentials
                        .store_discogs_token(self.profile.as_deref(), &token)?;
                }
                println!("Connected to Discogs as {}", status.display_name());
            }
            Command::Logout => {
                self.session.logout().await;
                if let Err(e) = self.credentials.delete_discogs_token(self.profile.as_deref()) {
                    tracing::warn!(error = %e, "could not delete stored discogs token");
                }
                println!("Discogs disconnected.");
            }
            Command::Oauth { timeout_secs } => {
                let url = self.session.start_oauth().await?;
                println!("Open this URL to connect Discogs:\n{url}");
                let poll = self.session.poll_login(PollSettings {
                    timeout: Duration::from_secs(timeout_secs),
                    ..PollSettings::default()
                });
                match poll.outcome().await {
                    PollOutcome::LoggedIn(status) => {
                        println!("Connected to Discogs as {}", status.display_name())
                    }
                    PollOutcome::TimedOut => println!("Timed out waiting for the Discogs login."),
                    PollOutcome::Cancelled => println!("Login cancelled."),
                }
            }
            Command::Wishlist { page, limit } => {
                self.connect().await;
                let wishlist = self.session.wishlist(page, limit).await?;
                println!(
                    "Wantlist page {} ({} releases in total)",
                    wishlist.page, wishlist.total
                );
                for item in &wishlist.items {
                    println!("{}", format_wishlist_item(item));
                }
            }
            Command::Want(args) => {
                let index = args.index()?;
                self.open(&args.playlist, false).await?;
                match self.session.add_to_wantlist(index).await? {
                    WantlistOutcome::Added => println!("Added to wantlist."),
                    WantlistOutcome::AlreadyPresent => println!("Already in your Discogs library."),
                }
            }
            Command::Search(args) => {
                let index = args.index()?;
                self.open(&args.playlist, false).await?;
                match self.session.search_track(index).await? {
                    Some(url) => println!("Found {url}"),
                    None => println!("No Discogs match."),
                }
            }
            Command::Albums { playlist } => {
                self.open(&playlist, true).await?;
                for album in self.session.extract_albums().await? {
                    println!("{} - {} ({} tracks)", album.artist, album.album, album.track_count);
                }
            }
            Command::Curation {
                playlist,
                missing_only,
            } => {
                self.open(&playlist, true).await?;
                for item in self.session.curation_queue(missing_only)? {
                    println!("{}", format_curation_item(&item));
                }
            }
            Command::Cache(CacheCommand::Clear { playlist }) => {
                self.session.clear_cache(playlist.as_deref());
                println!("Cache cleared.");
            }
            Command::ViewMode { mode } => {
                if let Some(mode) = mode {
                    self.session
                        .set_view_mode(mode.parse::<ViewMode>().unwrap_or_default());
                }
                println!("{}", self.session.view_mode().as_str());
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let mut config = Config::load_or_default(&dirs)?;
    if let Some(url) = cli.backend_url {
        config.backend.base_url = url;
        config.validate()?;
    }
    let _logging = init_logging(&config.logging, &dirs)?;
    tracing::debug!(
        backend = %config.backend.base_url,
        config_dir = %dirs.config_dir().display(),
        "starting vinylmatch"
    );

    let app = App::new(&config, &dirs, cli.profile)?;
    app.run(cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use vinylmatch_core::curation::Vendor;
    use vinylmatch_core::models::{DiscogsStatus, LibraryState};

    fn snapshot() -> RowSnapshot {
        RowSnapshot {
            index: 0,
            track_name: "One More Time".into(),
            artist: "Daft Punk".into(),
            album: "Discovery".into(),
            discogs_status: DiscogsStatus::Found,
            discogs_url: Some("https://www.discogs.com/release/1".into()),
            library: LibraryState::Owned,
        }
    }

    #[test]
    fn explicit_token_wins_over_stored() {
        let token = pick_token(Some("abc".into()), Some("stored".into())).unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn blank_token_falls_back_to_stored() {
        let token = pick_token(Some("  ".into()), Some("stored".into())).unwrap();
        assert_eq!(token, "stored");
        assert_eq!(pick_token(None, None), Err(CommandError::MissingToken));
    }

    #[test]
    fn rows_are_one_based() {
        let args = RowArgs {
            playlist: "pl".into(),
            row: 3,
        };
        assert_eq!(args.index(), Ok(2));
        let zero = RowArgs {
            playlist: "pl".into(),
            row: 0,
        };
        assert_eq!(zero.index(), Err(CommandError::ZeroRow));
    }

    #[test]
    fn row_line_shows_match_and_library_badge() {
        let line = format_row(&snapshot());
        assert_eq!(
            line,
            "   1. Daft Punk - One More Time [Discovery] Direct match \
             <https://www.discogs.com/release/1> (In collection)"
        );
    }

    #[test]
    fn pending_row_has_no_link() {
        let mut row = snapshot();
        row.discogs_status = DiscogsStatus::Pending;
        row.discogs_url = None;
        row.library = LibraryState::Absent;
        assert_eq!(
            format_row(&row),
            "   1. Daft Punk - One More Time [Discovery] Searching"
        );
    }

    #[test]
    fn curation_line_lists_missing_vendors() {
        let item = CurationItem {
            album_key: "daft punk|discovery|2001".into(),
            artist: "Daft Punk".into(),
            album: "Discovery".into(),
            release_year: Some(2001),
            track_name: "One More Time".into(),
            cover_url: None,
            discogs_album_url: None,
            missing: vec![Vendor::Discogs, Vendor::Hhv],
        };
        assert_eq!(
            format_curation_item(&item),
            "Daft Punk - Discovery (2001): missing Discogs, HHV"
        );
    }

    #[test]
    fn cli_parses_row_commands() {
        let cli = Cli::try_parse_from(["vinylmatch", "want", "37i9dQZF1DX", "4"]).unwrap();
        match cli.command {
            Command::Want(args) => {
                assert_eq!(args.playlist, "37i9dQZF1DX");
                assert_eq!(args.row, 4);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_global_overrides() {
        let cli = Cli::try_parse_from([
            "vinylmatch",
            "playlist",
            "abc",
            "--all",
            "--backend-url",
            "http://localhost:9000",
        ])
        .unwrap();
        assert_eq!(cli.backend_url.as_deref(), Some("http://localhost:9000"));
        assert!(matches!(cli.command, Command::Playlist { all: true, .. }));
    }
}
