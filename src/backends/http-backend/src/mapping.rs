use crate::models::{
    BatchResultDto, LibraryStatusDto, PlaylistResponse, TrackDto, WishlistResponse,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use vinylmatch_core::chunk_store::offset_in_bounds;
use vinylmatch_core::models::{
    LibraryFlags, LookupKey, LookupResult, PlaylistChunk, Track, TrackKey, WishlistItem,
    WishlistPage,
};

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Non-negative integer from a JSON number or a numeric string.
pub fn coerce_count(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Year from a number, `"1997"` or a date such as `"1997-05-21"`.
pub fn coerce_year(value: Option<&Value>) -> Option<i32> {
    let year = match value? {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }?;
    (year > 0).then_some(year)
}

/// Decodes each element on its own; malformed elements are logged and dropped.
pub fn decode_lenient<T: DeserializeOwned>(values: Vec<Value>, what: &'static str) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(idx, value)| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "skipping malformed {what}");
                None
            }
        })
        .collect()
}

pub fn map_track(dto: TrackDto) -> Track {
    Track {
        track_name: non_blank(dto.track_name).unwrap_or_default(),
        artist: non_blank(dto.artist).unwrap_or_default(),
        album: non_blank(dto.album).unwrap_or_default(),
        release_year: coerce_year(dto.release_year.as_ref()),
        album_url: non_blank(dto.album_url),
        cover_url: non_blank(dto.cover_url),
        barcode: non_blank(dto.barcode),
        spotify_track_id: non_blank(dto.spotify_track_id),
        discogs_album_url: non_blank(dto.discogs_album_url),
        hhv_url: non_blank(dto.hhv_url),
        jpc_url: non_blank(dto.jpc_url),
        amazon_url: non_blank(dto.amazon_url),
        ..Track::default()
    }
}

/// A malformed track becomes an empty row so later positions do not shift.
pub fn map_tracks(values: Vec<Value>) -> Vec<Track> {
    values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| match serde_json::from_value::<TrackDto>(value) {
            Ok(dto) => map_track(dto),
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "malformed track in playlist chunk");
                Track::default()
            }
        })
        .collect()
}

/// A page whose offset lies outside the advertised total keeps its
/// metadata but loses its tracks and offset.
pub fn map_chunk(response: PlaylistResponse) -> PlaylistChunk {
    let mut chunk = PlaylistChunk {
        playlist_name: non_blank(response.playlist_name),
        playlist_cover_url: non_blank(response.playlist_cover_url),
        playlist_url: non_blank(response.playlist_url),
        offset: coerce_count(response.offset.as_ref()),
        total_tracks: coerce_count(response.total_tracks.as_ref()),
        next_offset: coerce_count(response.next_offset.as_ref()),
        has_more: response.has_more,
        tracks: map_tracks(response.tracks),
    };
    if let Some(offset) = chunk.offset {
        if !offset_in_bounds(offset, chunk.tracks.len(), chunk.total_tracks) {
            tracing::warn!(
                offset,
                count = chunk.tracks.len(),
                total = ?chunk.total_tracks,
                "playlist chunk offset out of range"
            );
            chunk.offset = None;
            chunk.tracks.clear();
        }
    }
    chunk
}

pub fn map_batch_results(values: Vec<Value>) -> Vec<LookupResult> {
    decode_lenient::<BatchResultDto>(values, "lookup result")
        .into_iter()
        .map(|dto| LookupResult {
            key: non_blank(dto.key).map(TrackKey::new),
            index: coerce_count(dto.index.as_ref()),
            lookup_key: non_blank(dto.lookup_key).map(LookupKey::new),
            url: non_blank(dto.url),
            cache_hit: dto.cache_hit.unwrap_or(false),
        })
        .collect()
}

pub fn map_wishlist(response: WishlistResponse, page: u32, limit: u32) -> WishlistPage {
    let items: Vec<WishlistItem> = decode_lenient(response.items, "wishlist item");
    let to_u32 = |value: Option<&Value>| coerce_count(value).and_then(|n| u32::try_from(n).ok());
    WishlistPage {
        total: coerce_count(response.total.as_ref()).unwrap_or(items.len()),
        page: to_u32(response.page.as_ref()).unwrap_or(page),
        limit: to_u32(response.limit.as_ref()).unwrap_or(limit),
        items,
    }
}

pub fn map_library_flags(values: Vec<Value>) -> Vec<LibraryFlags> {
    decode_lenient::<LibraryStatusDto>(values, "library status")
        .into_iter()
        .filter_map(|dto| {
            Some(LibraryFlags {
                url: non_blank(dto.url)?,
                in_wishlist: dto.in_wishlist.unwrap_or(false),
                in_collection: dto.in_collection.unwrap_or(false),
            })
        })
        .collect()
}
