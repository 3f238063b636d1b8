//! Concurrent fan-out to the catalog: one related-tracks call seeded by a
//! recent like, plus one chart call per selected genre.

use super::error::DiscoveryError;
use super::taxonomy::ALL_GENRES;
use crate::catalog_client::{CatalogClient, CatalogFetchError, CatalogTrack};
use crate::config::DiscoverySettings;
use crate::interactions::{DecisionRecord, DisplayMetadata, GenreId, ItemId};
use crate::server::metrics;
use futures::future::join_all;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub item_id: ItemId,
    #[serde(flatten)]
    pub metadata: DisplayMetadata,
    pub source_genre_id: Option<GenreId>,
}

impl Candidate {
    fn from_track(track: CatalogTrack, source_genre_id: Option<GenreId>) -> Self {
        Candidate {
            item_id: track.id,
            metadata: track.metadata(),
            source_genre_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePools {
    pub expansion: Vec<Candidate>,
    pub charts: Vec<Candidate>,
}

#[derive(Debug, Clone, Copy)]
enum CatalogRequest {
    Chart(GenreId),
    Related(ItemId),
}

impl CatalogRequest {
    fn label(&self) -> &'static str {
        match self {
            CatalogRequest::Chart(ALL_GENRES) => "global_chart",
            CatalogRequest::Chart(_) => "chart",
            CatalogRequest::Related(_) => "related",
        }
    }
}

impl fmt::Display for CatalogRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogRequest::Chart(genre_id) => write!(f, "chart of genre {}", genre_id),
            CatalogRequest::Related(item_id) => write!(f, "tracks related to {}", item_id),
        }
    }
}

pub struct CandidateFetcher {
    catalog: Arc<dyn CatalogClient>,
    seed_pool_size: usize,
    related_limit: usize,
    chart_limit: usize,
    fetch_timeout: Duration,
}

impl CandidateFetcher {
    pub fn new(catalog: Arc<dyn CatalogClient>, settings: &DiscoverySettings) -> Self {
        Self {
            catalog,
            seed_pool_size: settings.seed_pool_size,
            related_limit: settings.related_limit,
            chart_limit: settings.chart_limit,
            fetch_timeout: settings.fetch_timeout(),
        }
    }

    async fn timed_fetch(
        &self,
        request: CatalogRequest,
    ) -> Result<Vec<CatalogTrack>, CatalogFetchError> {
        let call = async {
            match request {
                CatalogRequest::Chart(genre_id) => {
                    self.catalog.chart_tracks(genre_id, self.chart_limit).await
                }
                CatalogRequest::Related(item_id) => {
                    self.catalog
                        .related_tracks(item_id, self.related_limit)
                        .await
                }
            }
        };
        match tokio::time::timeout(self.fetch_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CatalogFetchError::Timeout),
        }
    }

    /// A failed fetch contributes nothing, it is logged and counted.
    async fn fetch_tagged(
        &self,
        request: CatalogRequest,
        tag: Option<GenreId>,
    ) -> Result<Vec<Candidate>, (CatalogRequest, CatalogFetchError)> {
        self.timed_fetch(request)
            .await
            .map(|tracks| {
                tracks
                    .into_iter()
                    .map(|track| Candidate::from_track(track, tag))
                    .collect()
            })
            .map_err(|err| (request, err))
    }

    /// `accepted` are the viewer's recent accept records, newest first.
    /// Waits for every call to settle; only fails when not even the global
    /// chart can be fetched.
    pub async fn fetch<R: Rng + ?Sized>(
        &self,
        accepted: &[DecisionRecord],
        selection: &[GenreId],
        fatigued: bool,
        rng: &mut R,
    ) -> Result<CandidatePools, DiscoveryError> {
        let seed = if fatigued {
            None
        } else {
            let eligible = &accepted[..accepted.len().min(self.seed_pool_size)];
            eligible.choose(rng).map(|record| (record.item_id, record.genre_id))
        };

        let expansion = async {
            match seed {
                Some((item_id, genre_id)) => {
                    Some(self.fetch_tagged(CatalogRequest::Related(item_id), genre_id).await)
                }
                None => None,
            }
        };
        let charts = join_all(
            selection
                .iter()
                .map(|genre_id| self.fetch_tagged(CatalogRequest::Chart(*genre_id), Some(*genre_id))),
        );
        let (expansion, charts) = futures::join!(expansion, charts);

        let mut pools = CandidatePools::default();
        let mut failures = Vec::new();
        match expansion {
            Some(Ok(candidates)) => pools.expansion = candidates,
            Some(Err(failure)) => failures.push(failure),
            None => {}
        }
        for result in charts {
            match result {
                Ok(candidates) => pools.charts.extend(candidates),
                Err(failure) => failures.push(failure),
            }
        }
        for (request, err) in &failures {
            warn!("Failed to fetch {}: {}", request, err);
            metrics::record_catalog_fetch_failure(request.label(), err.kind());
        }

        if pools.charts.is_empty() {
            debug!(
                "No chart candidates for genres {:?}, falling back to the global chart",
                selection
            );
            match self.timed_fetch(CatalogRequest::Chart(ALL_GENRES)).await {
                Ok(tracks) => {
                    pools.charts = tracks
                        .into_iter()
                        .map(|track| Candidate::from_track(track, None))
                        .collect()
                }
                Err(err) => {
                    warn!("Failed to fetch the global chart: {}", err);
                    metrics::record_catalog_fetch_failure(
                        CatalogRequest::Chart(ALL_GENRES).label(),
                        err.kind(),
                    );
                    return Err(DiscoveryError::UpstreamUnavailable);
                }
            }
        }

        debug!(
            "Fetched {} expansion and {} chart candidates ({} failed calls)",
            pools.expansion.len(),
            pools.charts.len(),
            failures.len()
        );
        Ok(pools)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::interactions::{Decision, Identity};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn track(id: ItemId) -> CatalogTrack {
        CatalogTrack {
            id,
            title: Some(format!("Track {}", id)),
            preview: None,
            artist: None,
            album: None,
        }
    }

    /// Catalog with canned answers, anything not configured fails with a
    /// 500 status.
    #[derive(Default)]
    pub struct FakeCatalog {
        charts: Mutex<HashMap<GenreId, Vec<ItemId>>>,
        related: Mutex<HashMap<ItemId, Vec<ItemId>>>,
        slow_genres: Mutex<Vec<GenreId>>,
        latency: Mutex<Option<Duration>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        pub fn with_chart(self, genre_id: GenreId, ids: &[ItemId]) -> Self {
            self.charts.lock().unwrap().insert(genre_id, ids.to_vec());
            self
        }

        pub fn with_related(self, item_id: ItemId, ids: &[ItemId]) -> Self {
            self.related.lock().unwrap().insert(item_id, ids.to_vec());
            self
        }

        pub fn with_slow_genre(self, genre_id: GenreId) -> Self {
            self.slow_genres.lock().unwrap().push(genre_id);
            self
        }

        /// Every call sleeps this long before answering.
        pub fn with_latency(self, latency: Duration) -> Self {
            *self.latency.lock().unwrap() = Some(latency);
            self
        }

        async fn simulate_latency(&self) {
            let latency = *self.latency.lock().unwrap();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogClient for FakeCatalog {
        async fn chart_tracks(
            &self,
            genre: GenreId,
            _limit: usize,
        ) -> Result<Vec<CatalogTrack>, CatalogFetchError> {
            self.calls.lock().unwrap().push(format!("chart/{}", genre));
            self.simulate_latency().await;
            let slow = self.slow_genres.lock().unwrap().contains(&genre);
            if slow {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            let ids = self.charts.lock().unwrap().get(&genre).cloned();
            ids.map(|ids| ids.into_iter().map(track).collect())
                .ok_or(CatalogFetchError::Status(500))
        }

        async fn related_tracks(
            &self,
            item_id: ItemId,
            _limit: usize,
        ) -> Result<Vec<CatalogTrack>, CatalogFetchError> {
            self.calls.lock().unwrap().push(format!("related/{}", item_id));
            self.simulate_latency().await;
            let ids = self.related.lock().unwrap().get(&item_id).cloned();
            ids.map(|ids| ids.into_iter().map(track).collect())
                .ok_or(CatalogFetchError::Connection("refused".to_string()))
        }
    }

    fn accepted(item_id: ItemId, genre_id: Option<GenreId>) -> DecisionRecord {
        DecisionRecord {
            id: item_id as usize,
            identity: Identity::Session("s".to_string()),
            item_id,
            decision: Decision::Accept,
            genre_id,
            metadata: DisplayMetadata::default(),
            created_at: 0,
        }
    }

    fn fetcher(catalog: FakeCatalog) -> (CandidateFetcher, Arc<FakeCatalog>) {
        let catalog = Arc::new(catalog);
        let settings = DiscoverySettings {
            fetch_timeout_ms: 200,
            ..Default::default()
        };
        (CandidateFetcher::new(catalog.clone(), &settings), catalog)
    }

    fn ids(candidates: &[Candidate]) -> Vec<ItemId> {
        candidates.iter().map(|c| c.item_id).collect()
    }

    #[tokio::test]
    async fn tags_candidates_with_their_source() {
        let (fetcher, _) = fetcher(
            FakeCatalog::default()
                .with_chart(132, &[1, 2])
                .with_chart(152, &[3])
                .with_related(10, &[11, 12]),
        );

        let pools = fetcher
            .fetch(
                &[accepted(10, Some(116))],
                &[132, 152],
                false,
                &mut StdRng::seed_from_u64(1),
            )
            .await
            .unwrap();

        assert_eq!(ids(&pools.expansion), vec![11, 12]);
        assert!(pools
            .expansion
            .iter()
            .all(|c| c.source_genre_id == Some(116)));
        assert_eq!(ids(&pools.charts), vec![1, 2, 3]);
        assert_eq!(pools.charts[0].source_genre_id, Some(132));
        assert_eq!(pools.charts[2].source_genre_id, Some(152));
        assert_eq!(pools.charts[0].metadata.title.as_deref(), Some("Track 1"));
    }

    #[tokio::test]
    async fn no_seed_no_expansion() {
        let (fetcher, catalog) = fetcher(FakeCatalog::default().with_chart(132, &[1]));

        let pools = fetcher
            .fetch(&[], &[132], false, &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();

        assert!(pools.expansion.is_empty());
        assert_eq!(ids(&pools.charts), vec![1]);
        assert_eq!(catalog.calls(), vec!["chart/132".to_string()]);
    }

    #[tokio::test]
    async fn fatigue_suppresses_expansion() {
        let (fetcher, catalog) = fetcher(
            FakeCatalog::default()
                .with_chart(132, &[1])
                .with_related(10, &[11]),
        );

        let pools = fetcher
            .fetch(
                &[accepted(10, Some(132))],
                &[132],
                true,
                &mut StdRng::seed_from_u64(1),
            )
            .await
            .unwrap();

        assert!(pools.expansion.is_empty());
        assert!(!catalog.calls().iter().any(|c| c.starts_with("related")));
    }

    #[tokio::test]
    async fn seed_is_one_of_the_newest_accepts() {
        let catalog = (1..=10).fold(FakeCatalog::default().with_chart(132, &[1]), |c, id| {
            c.with_related(id, &[id * 100])
        });
        let (fetcher, catalog) = fetcher(catalog);
        let history: Vec<DecisionRecord> = (1..=10).map(|id| accepted(id, None)).collect();

        for seed in 0..20 {
            fetcher
                .fetch(&history, &[132], false, &mut StdRng::seed_from_u64(seed))
                .await
                .unwrap();
        }

        for call in catalog.calls().iter().filter(|c| c.starts_with("related/")) {
            let item_id: ItemId = call.trim_start_matches("related/").parse().unwrap();
            assert!(item_id <= 5, "seed {} is not among the 5 newest", item_id);
        }
    }

    #[tokio::test]
    async fn partial_failures_keep_the_rest() {
        let (fetcher, _) = fetcher(
            FakeCatalog::default()
                .with_chart(132, &[1, 2])
                .with_chart(113, &[3]),
        );

        // 152 and the related call fail.
        let pools = fetcher
            .fetch(
                &[accepted(10, None)],
                &[132, 152, 113],
                false,
                &mut StdRng::seed_from_u64(1),
            )
            .await
            .unwrap();

        assert!(pools.expansion.is_empty());
        assert_eq!(ids(&pools.charts), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn slow_calls_time_out_without_blocking_siblings() {
        let (fetcher, _) = fetcher(
            FakeCatalog::default()
                .with_chart(132, &[1])
                .with_chart(152, &[2])
                .with_slow_genre(152),
        );

        let pools = tokio::time::timeout(
            Duration::from_secs(5),
            fetcher.fetch(&[], &[132, 152], false, &mut StdRng::seed_from_u64(1)),
        )
        .await
        .expect("fetch should not wait for the slow call")
        .unwrap();

        assert_eq!(ids(&pools.charts), vec![1]);
    }

    #[tokio::test]
    async fn sub_fetches_run_concurrently() {
        let latency = Duration::from_millis(150);
        let catalog = Arc::new(
            FakeCatalog::default()
                .with_chart(132, &[1])
                .with_chart(152, &[2])
                .with_chart(116, &[3])
                .with_related(10, &[11])
                .with_latency(latency),
        );
        let settings = DiscoverySettings {
            fetch_timeout_ms: 1000,
            ..Default::default()
        };
        let fetcher = CandidateFetcher::new(catalog.clone(), &settings);

        let start = std::time::Instant::now();
        let pools = fetcher
            .fetch(
                &[accepted(10, Some(132))],
                &[132, 152, 116],
                false,
                &mut StdRng::seed_from_u64(1),
            )
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(
            elapsed < latency * 2,
            "four calls of {:?} took {:?}",
            latency,
            elapsed
        );
        assert_eq!(ids(&pools.expansion), vec![11]);
        assert_eq!(ids(&pools.charts), vec![1, 2, 3]);
        assert_eq!(catalog.calls().len(), 4);
    }

    #[tokio::test]
    async fn falls_back_to_global_chart() {
        let (fetcher, catalog) = fetcher(FakeCatalog::default().with_chart(ALL_GENRES, &[7, 8]));

        let pools = fetcher
            .fetch(&[], &[132, 152], false, &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();

        assert_eq!(ids(&pools.charts), vec![7, 8]);
        assert!(pools.charts.iter().all(|c| c.source_genre_id.is_none()));
        assert_eq!(catalog.calls().last().unwrap(), "chart/0");
    }

    #[tokio::test]
    async fn empty_charts_also_fall_back() {
        let (fetcher, _) = fetcher(
            FakeCatalog::default()
                .with_chart(132, &[])
                .with_chart(ALL_GENRES, &[7]),
        );

        let pools = fetcher
            .fetch(&[], &[132], false, &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();
        assert_eq!(ids(&pools.charts), vec![7]);
    }

    #[tokio::test]
    async fn total_failure_is_upstream_unavailable() {
        let (fetcher, _) = fetcher(FakeCatalog::default().with_related(10, &[11]));

        let result = fetcher
            .fetch(
                &[accepted(10, None)],
                &[132, 152],
                false,
                &mut StdRng::seed_from_u64(1),
            )
            .await;

        assert!(matches!(result, Err(DiscoveryError::UpstreamUnavailable)));
    }
}
