use super::fetcher::{Candidate, CandidatePools};
use rand::seq::SliceRandom;
use rand::Rng;

/// Concatenates expansion and chart candidates and shuffles them.
/// Items present in both pools are kept twice.
pub fn mix<R: Rng + ?Sized>(pools: CandidatePools, rng: &mut R) -> Vec<Candidate> {
    let CandidatePools {
        mut expansion,
        charts,
    } = pools;
    expansion.extend(charts);
    expansion.shuffle(rng);
    expansion
}
