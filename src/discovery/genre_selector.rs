use super::history::HistoryAnalysis;
use super::taxonomy::GenreTaxonomy;
use crate::interactions::GenreId;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

fn without(genres: &[GenreId], excluded: &HashSet<GenreId>) -> Vec<GenreId> {
    genres
        .iter()
        .filter(|genre_id| !excluded.contains(genre_id))
        .copied()
        .collect()
}

/// Candidate genre pools in order of precedence, the first non-empty one is
/// sampled. The last pool is always the full taxonomy.
pub fn candidate_pools(
    analysis: &HistoryAnalysis,
    preferences: &[GenreId],
    taxonomy: &GenreTaxonomy,
) -> Vec<Vec<GenreId>> {
    let all = taxonomy.ids();
    let not_aversive = without(&all, &analysis.aversion_set);
    // Stored preferences may predate a smaller configured taxonomy.
    let preferences: Vec<GenreId> = preferences
        .iter()
        .copied()
        .filter(|genre_id| taxonomy.contains(*genre_id))
        .collect();

    if analysis.fatigued {
        // Break the rejection streak with genres outside the usual preferences.
        let mut excluded = analysis.aversion_set.clone();
        excluded.extend(preferences.iter().copied());
        vec![without(&all, &excluded), not_aversive, all]
    } else if !preferences.is_empty() {
        vec![
            without(&preferences, &analysis.aversion_set),
            not_aversive,
            all,
        ]
    } else {
        vec![not_aversive, all]
    }
}

/// Picks up to `count` distinct genres to sample this round.
pub fn select_genres<R: Rng + ?Sized>(
    analysis: &HistoryAnalysis,
    preferences: &[GenreId],
    taxonomy: &GenreTaxonomy,
    count: usize,
    rng: &mut R,
) -> Vec<GenreId> {
    let mut pool = candidate_pools(analysis, preferences, taxonomy)
        .into_iter()
        .find(|pool| !pool.is_empty())
        .unwrap_or_default();
    pool.shuffle(rng);
    pool.truncate(count);
    pool
}
