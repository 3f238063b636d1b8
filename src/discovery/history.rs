//! Derives per-genre affinity and a global fatigue signal from the recent
//! decisions of a viewer.
//!
//! Aversion is genre-specific and slow: it needs a minimum number of samples
//! over the whole history window. Fatigue is genre-agnostic and fast: it only
//! looks at the newest few decisions.

use crate::config::DiscoverySettings;
use crate::interactions::{Decision, DecisionRecord, GenreId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenreStats {
    pub likes: usize,
    pub skips: usize,
}

impl GenreStats {
    pub fn total(&self) -> usize {
        self.likes + self.skips
    }

    pub fn skip_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.skips as f64 / total as f64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryAnalysis {
    pub genre_stats: HashMap<GenreId, GenreStats>,
    pub aversion_set: HashSet<GenreId>,
    pub fatigued: bool,
}

/// `records` must be newest first. Only the first `history_window` records
/// are looked at.
pub fn analyze_history(records: &[DecisionRecord], settings: &DiscoverySettings) -> HistoryAnalysis {
    let window = &records[..records.len().min(settings.history_window)];

    let mut genre_stats: HashMap<GenreId, GenreStats> = HashMap::new();
    for record in window {
        // Untagged records only count for fatigue.
        let Some(genre_id) = record.genre_id else {
            continue;
        };
        let stats = genre_stats.entry(genre_id).or_default();
        match record.decision {
            Decision::Accept => stats.likes += 1,
            Decision::Reject => stats.skips += 1,
        }
    }

    let aversion_set = genre_stats
        .iter()
        .filter(|(_, stats)| {
            stats.total() >= settings.aversion_min_samples
                && stats.skip_ratio() >= settings.aversion_skip_ratio
        })
        .map(|(genre_id, _)| *genre_id)
        .collect();

    let recent_rejects = window
        .iter()
        .take(settings.fatigue_window)
        .filter(|record| record.decision == Decision::Reject)
        .count();

    HistoryAnalysis {
        genre_stats,
        aversion_set,
        fatigued: recent_rejects >= settings.fatigue_reject_threshold,
    }
}
