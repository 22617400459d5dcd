//! Album-level worklist of releases still missing shop or Discogs links.

use crate::models::Track;
use crate::normalize::{build_album_key, primary_artist};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Vendor {
    Discogs,
    Hhv,
    Jpc,
    Amazon,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Vendor::Discogs => "Discogs",
            Vendor::Hhv => "HHV",
            Vendor::Jpc => "JPC",
            Vendor::Amazon => "Amazon",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurationItem {
    pub album_key: String,
    pub artist: String,
    pub album: String,
    pub release_year: Option<i32>,
    pub track_name: String,
    pub cover_url: Option<String>,
    pub discogs_album_url: Option<String>,
    pub missing: Vec<Vendor>,
}

fn has_link(link: &Option<String>) -> bool {
    link.as_deref().is_some_and(|value| !value.trim().is_empty())
}

pub fn detect_missing_links(track: &Track) -> Vec<Vendor> {
    [
        (Vendor::Discogs, &track.discogs_album_url),
        (Vendor::Hhv, &track.hhv_url),
        (Vendor::Jpc, &track.jpc_url),
        (Vendor::Amazon, &track.amazon_url),
    ]
    .into_iter()
    .filter(|(_, link)| !has_link(link))
    .map(|(vendor, _)| vendor)
    .collect()
}

/// One entry per album, albums without a Discogs link first.
///
/// With `missing_only`, fully linked tracks are skipped without claiming their
/// album key, so a later row of the same album that lacks a link still counts.
pub fn build_curation_queue<'a, I>(tracks: I, missing_only: bool) -> Vec<CurationItem>
where
    I: IntoIterator<Item = &'a Track>,
{
    let mut seen = HashSet::new();
    let mut queue = Vec::new();
    for track in tracks {
        if track.album.trim().is_empty() {
            continue;
        }
        let album_key = build_album_key(track);
        if seen.contains(&album_key) {
            continue;
        }
        let missing = detect_missing_links(track);
        if missing_only && missing.is_empty() {
            continue;
        }
        seen.insert(album_key.clone());

        let primary = primary_artist(&track.artist);
        queue.push(CurationItem {
            album_key,
            artist: if primary.is_empty() {
                track.artist.clone()
            } else {
                primary
            },
            album: track.album.clone(),
            release_year: track.release_year,
            track_name: track.track_name.clone(),
            cover_url: track.cover_url.clone(),
            discogs_album_url: track.discogs_album_url.clone(),
            missing,
        });
    }
    queue.sort_by_key(|item| has_link(&item.discogs_album_url));
    queue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(mut track: Track) -> Track {
        track.discogs_album_url = Some("https://www.discogs.com/release/1".into());
        track.hhv_url = Some("https://hhv.de/x".into());
        track.jpc_url = Some("https://jpc.de/x".into());
        track.amazon_url = Some("https://amazon.de/x".into());
        track
    }

    #[test]
    fn detects_each_missing_vendor() {
        let mut track = Track::new("One More Time", "Daft Punk", "Discovery");
        assert_eq!(detect_missing_links(&track).len(), 4);
        track.hhv_url = Some("https://hhv.de/x".into());
        track.amazon_url = Some("  ".into());
        assert_eq!(
            detect_missing_links(&track),
            vec![Vendor::Discogs, Vendor::Jpc, Vendor::Amazon]
        );
    }

    #[test]
    fn queue_dedups_albums_and_skips_albumless_rows() {
        let tracks = vec![
            Track::new("One More Time", "Daft Punk", "Discovery").with_release_year(2001),
            Track::new("Aerodynamic", "Daft Punk", "Discovery").with_release_year(2001),
            Track::new("Single", "Someone", ""),
        ];
        let queue = build_curation_queue(&tracks, true);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].track_name, "One More Time");
    }

    #[test]
    fn albums_without_discogs_url_come_first() {
        let mut with_discogs = Track::new("Around the World", "Daft Punk", "Homework");
        with_discogs.discogs_album_url = Some("https://www.discogs.com/release/9".into());
        let tracks = vec![
            with_discogs,
            Track::new("Teardrop", "Massive Attack", "Mezzanine"),
            Track::new("Roads", "Portishead", "Dummy"),
        ];
        let queue = build_curation_queue(&tracks, true);
        let albums: Vec<_> = queue.iter().map(|i| i.album.as_str()).collect();
        assert_eq!(albums, vec!["Mezzanine", "Dummy", "Homework"]);
    }

    #[test]
    fn fully_linked_rows_do_not_claim_album() {
        let tracks = vec![
            linked(Track::new("A", "Air", "Moon Safari")),
            Track::new("B", "Air", "Moon Safari"),
        ];
        let queue = build_curation_queue(&tracks, true);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].track_name, "B");

        let all = build_curation_queue(&tracks, false);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].track_name, "A");
        assert!(all[0].missing.is_empty());
    }

    #[test]
    fn featured_artists_are_dropped() {
        let tracks = vec![Track::new("Get Lucky", "Daft Punk feat. Pharrell", "RAM")];
        let queue = build_curation_queue(&tracks, true);
        assert_eq!(queue[0].artist, "Daft Punk");
    }
}
