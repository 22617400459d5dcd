//! Wire payloads of the VinylMatch REST API.
//!
//! Everything is optional on the way in; `mapping` decides what a usable
//! value looks like.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vinylmatch_core::models::{LookupRequest, Track};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistResponse {
    #[serde(default)]
    pub playlist_name: Option<String>,
    #[serde(default)]
    pub playlist_cover_url: Option<String>,
    #[serde(default)]
    pub playlist_url: Option<String>,
    #[serde(default)]
    pub tracks: Vec<Value>,
    #[serde(default)]
    pub offset: Option<Value>,
    #[serde(default)]
    pub total_tracks: Option<Value>,
    #[serde(default)]
    pub next_offset: Option<Value>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDto {
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub release_year: Option<Value>,
    #[serde(default)]
    pub album_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub spotify_track_id: Option<String>,
    #[serde(default)]
    pub discogs_album_url: Option<String>,
    #[serde(default)]
    pub hhv_url: Option<String>,
    #[serde(default)]
    pub jpc_url: Option<String>,
    #[serde(default)]
    pub amazon_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchRequest<'a> {
    pub tracks: &'a [LookupRequest],
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResultDto {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub index: Option<Value>,
    #[serde(default)]
    pub lookup_key: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub cache_hit: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthStartResponse {
    #[serde(default)]
    pub authorize_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WishlistResponse {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub total: Option<Value>,
    #[serde(default)]
    pub page: Option<Value>,
    #[serde(default)]
    pub limit: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct WishlistAddRequest<'a> {
    pub url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LibraryStatusRequest<'a> {
    pub urls: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
pub struct LibraryStatusResponse {
    #[serde(default)]
    pub results: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStatusDto {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub in_wishlist: Option<bool>,
    #[serde(default)]
    pub in_collection: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ExtractRequest<'a> {
    pub tracks: &'a [Track],
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractResponse {
    #[serde(default)]
    pub albums: Vec<Value>,
}

/// `{"error": {"code", "status", "message"}}` as sent on failures.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
