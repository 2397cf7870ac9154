//! Nearest-neighbour selection over corpus embeddings.
//!
//! A brute-force scan: every candidate is scored with
//! [`cosine_similarity`] against the query and the maximum wins. Candidates
//! without an embedding, with a different dimensionality, or with an
//! undefined similarity (zero norm) are skipped rather than ranked.

use serde::Serialize;

use crate::embedding::cosine_similarity;

/// The winning candidate of a similarity scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Match {
    /// Position of the candidate in the input sequence.
    pub index: usize,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Return the candidate with the highest cosine similarity to `query`.
///
/// Ties resolve to the earliest index. Returns `None` when no candidate has a
/// defined similarity (empty input, all `None`, all zero-norm or mismatched).
pub fn best_match<'a, I>(query: &[f32], candidates: I) -> Option<Match>
where
    I: IntoIterator<Item = Option<&'a [f32]>>,
{
    let mut best: Option<Match> = None;
    let mut skipped = 0usize;

    for (index, candidate) in candidates.into_iter().enumerate() {
        let Some(vector) = candidate else {
            skipped += 1;
            continue;
        };
        let Some(score) = cosine_similarity(query, vector) else {
            skipped += 1;
            continue;
        };
        if best.map_or(true, |b| score > b.score) {
            best = Some(Match { index, score });
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "candidates without a usable embedding were skipped");
    }

    best
}
