//! Client side of the external music catalog.

mod deezer;
mod models;

pub use deezer::{DeezerCatalogClient, DEFAULT_CATALOG_BASE_URL};
pub use models::{CatalogAlbum, CatalogArtist, CatalogTrack};

use crate::interactions::{GenreId, ItemId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogFetchError {
    #[error("Could not reach the catalog: {0}")]
    Connection(String),

    #[error("Catalog request timed out")]
    Timeout,

    #[error("Catalog responded with status {0}")]
    Status(u16),

    #[error("Malformed catalog response: {0}")]
    Malformed(String),

    #[error("Catalog API error: {0}")]
    Api(String),
}

impl CatalogFetchError {
    /// Metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogFetchError::Connection(_) => "connection",
            CatalogFetchError::Timeout => "timeout",
            CatalogFetchError::Status(_) => "status",
            CatalogFetchError::Malformed(_) => "malformed",
            CatalogFetchError::Api(_) => "api",
        }
    }
}

impl From<reqwest::Error> for CatalogFetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogFetchError::Timeout
        } else if err.is_decode() {
            CatalogFetchError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            CatalogFetchError::Status(status.as_u16())
        } else {
            CatalogFetchError::Connection(err.to_string())
        }
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Top tracks of a genre. `ALL_GENRES` asks for the global chart.
    async fn chart_tracks(
        &self,
        genre: GenreId,
        limit: usize,
    ) -> Result<Vec<CatalogTrack>, CatalogFetchError>;

    /// Tracks similar to the given one.
    async fn related_tracks(
        &self,
        item_id: ItemId,
        limit: usize,
    ) -> Result<Vec<CatalogTrack>, CatalogFetchError>;
}
