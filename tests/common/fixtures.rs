//! Test fixtures: a user database and a stub music catalog

use super::constants::*;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use swipesound_server::catalog_client::{
    CatalogAlbum, CatalogArtist, CatalogClient, CatalogFetchError, CatalogTrack,
};
use swipesound_server::discovery::{GenreTaxonomy, ALL_GENRES};
use swipesound_server::interactions::{GenreId, ItemId};
use swipesound_server::{SqliteUserStore, UserManager};
use tempfile::TempDir;

/// Creates a temporary database holding the regular test user.
/// Returns (temp_dir, db_path)
pub fn create_test_db_with_users() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("swipesound.db");

    let store = Arc::new(SqliteUserStore::new(&db_path)?);
    let user_manager = UserManager::new(store, GenreTaxonomy::default());
    user_manager.register(TEST_USER, TEST_PASS)?;

    Ok((dir, db_path))
}

fn stub_track(id: ItemId, title: String, artist: String) -> CatalogTrack {
    CatalogTrack {
        id,
        title: Some(title),
        preview: Some(format!("https://cdn.example/preview/{}.mp3", id)),
        artist: Some(CatalogArtist { name: Some(artist) }),
        album: Some(CatalogAlbum {
            cover_big: Some(format!("https://cdn.example/cover/{}.jpg", id)),
            cover_medium: None,
            cover_small: None,
        }),
    }
}

/// Deterministic catalog: every chart and every related call succeeds,
/// unless the catalog is marked unavailable.
pub struct StubCatalog {
    pub available: bool,
}

#[async_trait]
impl CatalogClient for StubCatalog {
    async fn chart_tracks(
        &self,
        genre: GenreId,
        _limit: usize,
    ) -> Result<Vec<CatalogTrack>, CatalogFetchError> {
        if !self.available {
            return Err(CatalogFetchError::Status(503));
        }
        let artist = if genre == ALL_GENRES {
            "Everybody".to_string()
        } else {
            format!("Artist of genre {}", genre)
        };
        Ok((1..=STUB_CHART_SIZE as i64)
            .map(|n| {
                let id = chart_item_id(genre, n);
                stub_track(id, format!("Chart track {}", id), artist.clone())
            })
            .collect())
    }

    async fn related_tracks(
        &self,
        item_id: ItemId,
        _limit: usize,
    ) -> Result<Vec<CatalogTrack>, CatalogFetchError> {
        if !self.available {
            return Err(CatalogFetchError::Connection("stub catalog is down".to_string()));
        }
        Ok((1..=STUB_RELATED_SIZE as i64)
            .map(|n| {
                let id = related_item_id(item_id, n);
                stub_track(id, format!("Related track {}", id), "Similar artist".to_string())
            })
            .collect())
    }
}
