use crate::interactions::{DisplayMetadata, ItemId};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogArtist {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogAlbum {
    pub cover_big: Option<String>,
    pub cover_medium: Option<String>,
    pub cover_small: Option<String>,
}

/// The subset of a catalog track the feed needs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogTrack {
    pub id: ItemId,
    pub title: Option<String>,
    pub preview: Option<String>,
    pub artist: Option<CatalogArtist>,
    pub album: Option<CatalogAlbum>,
}

impl CatalogTrack {
    pub fn metadata(&self) -> DisplayMetadata {
        let cover_art_url = self.album.as_ref().and_then(|album| {
            album
                .cover_big
                .clone()
                .or_else(|| album.cover_medium.clone())
                .or_else(|| album.cover_small.clone())
        });
        DisplayMetadata {
            title: self.title.clone(),
            artist_name: self.artist.as_ref().and_then(|a| a.name.clone()),
            cover_art_url,
            preview_url: self.preview.clone(),
        }
        .normalized()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiError {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
    pub code: Option<i64>,
}

/// List endpoints answer either `{"data": [...]}` or `{"error": {...}}`,
/// both with status 200.
#[derive(Debug, Deserialize)]
pub(super) struct TrackListResponse {
    pub data: Option<Vec<CatalogTrack>>,
    pub error: Option<ApiError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track_and_picks_biggest_cover() {
        let track: CatalogTrack = serde_json::from_str(
            r#"{
                "id": 3135556,
                "title": "Harder, Better, Faster, Stronger ",
                "preview": "https://cdn.example/preview.mp3",
                "rank": 956167,
                "artist": {"id": 27, "name": "Daft Punk"},
                "album": {
                    "id": 302127,
                    "cover_small": "https://cdn.example/small.jpg",
                    "cover_big": "https://cdn.example/big.jpg"
                }
            }"#,
        )
        .unwrap();

        let metadata = track.metadata();
        assert_eq!(
            metadata.title.as_deref(),
            Some("Harder, Better, Faster, Stronger")
        );
        assert_eq!(metadata.artist_name.as_deref(), Some("Daft Punk"));
        assert_eq!(
            metadata.cover_art_url.as_deref(),
            Some("https://cdn.example/big.jpg")
        );
        assert_eq!(
            metadata.preview_url.as_deref(),
            Some("https://cdn.example/preview.mp3")
        );
    }

    #[test]
    fn tolerates_missing_fields() {
        let track: CatalogTrack = serde_json::from_str(r#"{"id": 1, "preview": ""}"#).unwrap();
        let metadata = track.metadata();
        assert_eq!(metadata, DisplayMetadata::default());
    }
}
