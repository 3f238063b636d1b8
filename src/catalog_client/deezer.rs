use super::models::{ApiError, CatalogTrack, TrackListResponse};
use super::{CatalogClient, CatalogFetchError};
use crate::interactions::{GenreId, ItemId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CATALOG_BASE_URL: &str = "https://api.deezer.com";

/// Catalog client speaking the Deezer public API.
pub struct DeezerCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl DeezerCatalogClient {
    pub fn new(base_url: &str, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_track_list(&self, url: String) -> Result<Vec<CatalogTrack>, CatalogFetchError> {
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CatalogFetchError::Status(response.status().as_u16()));
        }
        let body = response.text().await?;
        parse_track_list(&body)
    }
}

fn describe_api_error(error: ApiError) -> String {
    format!(
        "{}: {} (code {})",
        error.kind.as_deref().unwrap_or("UnknownError"),
        error.message.as_deref().unwrap_or("no message"),
        error.code.unwrap_or(-1)
    )
}

fn parse_track_list(body: &str) -> Result<Vec<CatalogTrack>, CatalogFetchError> {
    let response: TrackListResponse = serde_json::from_str(body)
        .map_err(|err| CatalogFetchError::Malformed(err.to_string()))?;
    if let Some(error) = response.error {
        return Err(CatalogFetchError::Api(describe_api_error(error)));
    }
    response
        .data
        .ok_or_else(|| CatalogFetchError::Malformed("missing data field".to_string()))
}

#[async_trait]
impl CatalogClient for DeezerCatalogClient {
    async fn chart_tracks(
        &self,
        genre: GenreId,
        limit: usize,
    ) -> Result<Vec<CatalogTrack>, CatalogFetchError> {
        self.get_track_list(format!(
            "{}/chart/{}/tracks?limit={}",
            self.base_url, genre, limit
        ))
        .await
    }

    async fn related_tracks(
        &self,
        item_id: ItemId,
        limit: usize,
    ) -> Result<Vec<CatalogTrack>, CatalogFetchError> {
        self.get_track_list(format!(
            "{}/track/{}/related?limit={}",
            self.base_url, item_id, limit
        ))
        .await
    }
}
