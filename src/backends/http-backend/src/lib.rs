mod mapping;
pub mod models;

use async_trait::async_trait;
use mapping::{decode_lenient, map_batch_results, map_chunk, map_library_flags, map_wishlist};
use models::{
    ApiErrorResponse, BatchRequest, BatchResponse, ExtractRequest, ExtractResponse,
    LibraryStatusRequest, LibraryStatusResponse, LoginRequest, OAuthStartResponse,
    PlaylistResponse, SearchResponse, WishlistAddRequest, WishlistResponse,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;
use vinylmatch_core::backend::{Backend, BackendError, BackendResult, WishlistAddOutcome};
use vinylmatch_core::config::BackendConfig;
use vinylmatch_core::models::{
    DiscogsAccountStatus, ExtractedAlbum, LibraryFlags, LookupRequest, LookupResult,
    PlaylistChunk, SearchQuery, Track, WishlistPage,
};

/// [`Backend`] over the VinylMatch REST API.
///
/// The client keeps a cookie jar, so the Discogs session established by
/// `discogs_login` sticks to later calls.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| BackendError::InvalidUrl {
            message: format!("{}: {e}", config.base_url),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::Network {
                message: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::InvalidUrl {
                message: format!("{path}: {e}"),
            })
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request.send().await.map_err(|e| BackendError::Network {
            message: e.to_string(),
        })?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> BackendResult<T> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "GET");
        let response = self.send(self.client.get(url).query(query)).await?;
        decode_body(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> BackendResult<T> {
        let response = self.post(path, body).await?;
        decode_body(response).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> BackendResult<Response> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "POST");
        self.send(self.client.post(url).json(body)).await
    }
}

async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    tracing::debug!(status = status.as_u16(), %message, "backend request failed");
    Err(match status {
        StatusCode::UNAUTHORIZED => BackendError::NotAuthenticated,
        StatusCode::CONFLICT => BackendError::Conflict { message },
        _ => BackendError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

fn error_message(body: &str) -> Option<String> {
    let parsed: ApiErrorResponse = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    error
        .message
        .or(error.code)
        .filter(|message| !message.trim().is_empty())
}

async fn decode_body<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let bytes = response.bytes().await.map_err(|e| BackendError::Network {
        message: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode {
        message: e.to_string(),
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_playlist_chunk(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> BackendResult<PlaylistChunk> {
        let body: PlaylistResponse = self
            .get_json(
                "api/playlist",
                &[
                    ("id", playlist_id.to_string()),
                    ("offset", offset.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        let mut chunk = map_chunk(body);
        chunk.offset.get_or_insert(offset);
        Ok(chunk)
    }

    async fn discogs_batch(&self, requests: &[LookupRequest]) -> BackendResult<Vec<LookupResult>> {
        let body: BatchResponse = self
            .post_json("api/discogs/batch", &BatchRequest { tracks: requests })
            .await?;
        Ok(map_batch_results(body.results))
    }

    async fn discogs_search(&self, query: &SearchQuery) -> BackendResult<Option<String>> {
        let body: SearchResponse = self.post_json("api/discogs/search", query).await?;
        Ok(body
            .url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()))
    }

    async fn discogs_status(&self) -> BackendResult<DiscogsAccountStatus> {
        self.get_json("api/discogs/status", &[]).await
    }

    async fn discogs_login(&self, token: &str) -> BackendResult<()> {
        self.post("api/discogs/login", &LoginRequest { token }).await?;
        Ok(())
    }

    async fn discogs_logout(&self) -> BackendResult<()> {
        self.post("api/discogs/logout", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn oauth_start(&self) -> BackendResult<String> {
        let body: OAuthStartResponse = self
            .post_json("api/discogs/oauth/start", &serde_json::json!({}))
            .await?;
        body.authorize_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| BackendError::Decode {
                message: "missing authorizeUrl".into(),
            })
    }

    async fn wishlist(&self, page: u32, limit: u32) -> BackendResult<WishlistPage> {
        let body: WishlistResponse = self
            .get_json(
                "api/discogs/wishlist",
                &[("page", page.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(map_wishlist(body, page, limit))
    }

    async fn wishlist_add(&self, url: &str) -> BackendResult<WishlistAddOutcome> {
        match self
            .post("api/discogs/wishlist/add", &WishlistAddRequest { url })
            .await
        {
            Ok(_) => Ok(WishlistAddOutcome::Added),
            Err(BackendError::Conflict { message }) => {
                tracing::debug!(%url, %message, "wantlist add conflicted");
                Ok(WishlistAddOutcome::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    async fn library_status(&self, urls: &[String]) -> BackendResult<Vec<LibraryFlags>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let body: LibraryStatusResponse = self
            .post_json("api/discogs/library-status", &LibraryStatusRequest { urls })
            .await?;
        Ok(map_library_flags(body.results))
    }

    async fn extract_albums(&self, tracks: &[Track]) -> BackendResult<Vec<ExtractedAlbum>> {
        let body: ExtractResponse = self
            .post_json("api/albums/extract", &ExtractRequest { tracks })
            .await?;
        Ok(decode_lenient(body.albums, "extracted album"))
    }
}
