//! Weighted Reciprocal Rank Fusion
//!
//! Combines the dense and sparse ranked lists into a single ranking without
//! requiring score normalization across the two retrieval methods. Each
//! result contributes `weight / (k + rank)` per source list (rank 0-based);
//! a result present in both lists has its contributions summed.

use std::collections::HashMap;

use ragkit_core::SearchResult;

/// Fuse a dense and a sparse ranked list.
///
/// Fused scores are normalized by the theoretical maximum
/// `(dense_weight + sparse_weight) / k`, so the output lives on a rough
/// [0, 1] scale comparable against the configured score thresholds.
///
/// Ties are broken by first-seen source order (dense before sparse), which
/// keeps the ordering deterministic for identical inputs.
pub fn fuse(
    dense: Vec<SearchResult>,
    sparse: Vec<SearchResult>,
    k: u32,
    dense_weight: f32,
    sparse_weight: f32,
) -> Vec<SearchResult> {
    struct Candidate {
        result: SearchResult,
        score: f32,
        first_seen: usize,
    }

    let mut candidates: Vec<Candidate> = Vec::with_capacity(dense.len() + sparse.len());
    let mut by_id: HashMap<String, usize> = HashMap::new();

    let mut absorb = |list: Vec<SearchResult>, weight: f32, candidates: &mut Vec<Candidate>| {
        for (rank, result) in list.into_iter().enumerate() {
            let contribution = weight / (k as f32 + rank as f32);
            match by_id.get(&result.id) {
                Some(&index) => candidates[index].score += contribution,
                None => {
                    by_id.insert(result.id.clone(), candidates.len());
                    candidates.push(Candidate {
                        result,
                        score: contribution,
                        first_seen: candidates.len(),
                    });
                }
            }
        }
    };

    absorb(dense, dense_weight, &mut candidates);
    absorb(sparse, sparse_weight, &mut candidates);

    let max_score = (dense_weight + sparse_weight) / k as f32;

    let mut fused: Vec<Candidate> = candidates;
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.first_seen.cmp(&b.first_seen))
    });

    fused
        .into_iter()
        .map(|candidate| {
            let mut result = candidate.result;
            result.score = candidate.score / max_score;
            result
        })
        .collect()
}
