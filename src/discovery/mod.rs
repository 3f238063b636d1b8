//! Feed composition: history analysis, genre selection, candidate fetching
//! and mixing, plus the decision write path.

mod engine;
mod error;
pub(crate) mod fetcher;
mod genre_selector;
mod history;
mod mixer;
mod recorder;
mod taxonomy;

pub use engine::DiscoveryEngine;
pub use error::DiscoveryError;
pub use fetcher::{Candidate, CandidateFetcher, CandidatePools};
pub use genre_selector::{candidate_pools, select_genres};
pub use history::{analyze_history, GenreStats, HistoryAnalysis};
pub use mixer::mix;
pub use recorder::{InteractionRecorder, SwipeInput};
pub use taxonomy::{Genre, GenreTaxonomy, ALL_GENRES, DEFAULT_TAXONOMY};
