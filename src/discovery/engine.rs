use super::error::DiscoveryError;
use super::fetcher::{Candidate, CandidateFetcher};
use super::genre_selector::select_genres;
use super::history::analyze_history;
use super::mixer::mix;
use super::recorder::{InteractionRecorder, SwipeInput};
use super::taxonomy::GenreTaxonomy;
use crate::catalog_client::CatalogClient;
use crate::config::DiscoverySettings;
use crate::interactions::{Decision, GenreId, Identity, InteractionStore, ItemId, LikedItem};
use crate::server::metrics;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

pub struct DiscoveryEngine {
    store: Arc<dyn InteractionStore>,
    recorder: InteractionRecorder,
    fetcher: CandidateFetcher,
    taxonomy: GenreTaxonomy,
    settings: DiscoverySettings,
}

impl DiscoveryEngine {
    pub fn new(
        store: Arc<dyn InteractionStore>,
        catalog: Arc<dyn CatalogClient>,
        settings: DiscoverySettings,
    ) -> Result<Self> {
        settings.validate()?;
        let taxonomy = GenreTaxonomy::from_ids(&settings.taxonomy)?;
        Ok(Self {
            recorder: InteractionRecorder::new(store.clone()),
            fetcher: CandidateFetcher::new(catalog, &settings),
            store,
            taxonomy,
            settings,
        })
    }

    pub fn taxonomy(&self) -> &GenreTaxonomy {
        &self.taxonomy
    }

    /// Builds a fresh feed for the viewer. Anonymous viewers get a cold-start
    /// feed.
    pub async fn compose_feed(
        &self,
        identity: Option<&Identity>,
        preferences: &[GenreId],
    ) -> Result<Vec<Candidate>, DiscoveryError> {
        let mut rng = StdRng::from_os_rng();
        self.compose_feed_with_rng(identity, preferences, &mut rng)
            .await
    }

    pub async fn compose_feed_with_rng<R: Rng + Send + ?Sized>(
        &self,
        identity: Option<&Identity>,
        preferences: &[GenreId],
        rng: &mut R,
    ) -> Result<Vec<Candidate>, DiscoveryError> {
        let start = Instant::now();
        let result = self.compose(identity, preferences, rng).await;
        let duration = start.elapsed();

        match &result {
            Ok(feed) => {
                debug!("Composed feed of {} items in {:?}", feed.len(), duration);
                metrics::record_feed_composition("ok", Some(feed.len()), duration);
            }
            Err(err @ DiscoveryError::UpstreamUnavailable) => {
                warn!("Feed composition failed: {}", err);
                metrics::record_feed_composition(err.kind(), None, duration);
            }
            Err(err) => {
                error!("Feed composition failed: {}", err);
                metrics::record_feed_composition(err.kind(), None, duration);
            }
        }
        result
    }

    async fn compose<R: Rng + Send + ?Sized>(
        &self,
        identity: Option<&Identity>,
        preferences: &[GenreId],
        rng: &mut R,
    ) -> Result<Vec<Candidate>, DiscoveryError> {
        let history = match identity {
            Some(identity) => self
                .store
                .get_recent_decisions(identity, self.settings.history_window)?,
            None => vec![],
        };
        let analysis = analyze_history(&history, &self.settings);

        let selection = select_genres(
            &analysis,
            preferences,
            &self.taxonomy,
            self.settings.genres_per_round,
            rng,
        );
        debug!(
            "History of {} records, fatigued: {}, aversion: {:?}, selected genres: {:?}",
            history.len(),
            analysis.fatigued,
            analysis.aversion_set,
            selection
        );

        let accepted = match identity {
            Some(identity) if !analysis.fatigued => self.store.get_recent_decisions_of_type(
                identity,
                Decision::Accept,
                self.settings.seed_pool_size,
            )?,
            _ => vec![],
        };

        let pools = self
            .fetcher
            .fetch(&accepted, &selection, analysis.fatigued, rng)
            .await?;
        Ok(mix(pools, rng))
    }

    pub fn record_decision(
        &self,
        identity: Option<&Identity>,
        input: SwipeInput,
    ) -> Result<usize, DiscoveryError> {
        self.recorder.record(identity, input)
    }

    pub fn remove_liked_item(
        &self,
        identity: Option<&Identity>,
        item_id: ItemId,
    ) -> Result<(), DiscoveryError> {
        self.recorder.remove_liked(identity, item_id)
    }

    pub fn list_liked_items(
        &self,
        identity: Option<&Identity>,
    ) -> Result<Vec<LikedItem>, DiscoveryError> {
        self.recorder.list_liked(identity)
    }
}
