//! Similarity engine.
//!
//! Two entities (two items, or two users) are compared through their
//! *co-participants*: the users who rated both items, or the items both users
//! rated. Each co-participant contributes one pair of ratings `(a, b)`.
//!
//! - **Euclidean**: `1 / (1 + Σ (a - b)²)`, in `(0, 1]`; identical patterns score 1.
//! - **Pearson**: population-form correlation of the two rating vectors, in `[-1, 1]`;
//!   0 when either vector has no variance.
//!
//! Without co-participants both metrics answer 0. Scores are rounded to
//! [`SCORE_PRECISION`](crate::SCORE_PRECISION) digits so cached matrices compare
//! exactly across runs.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sprs::CsVecView;

use crate::data::{Axis, RatingMatrix};
use crate::round_score;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimilarityMetric {
    #[default]
    Euclidean,
    Pearson,
}

impl SimilarityMetric {
    /// Rounded similarity over co-rating pairs.
    pub fn score(self, co_ratings: &[(f64, f64)]) -> f64 {
        let raw = match self {
            SimilarityMetric::Euclidean => euclidean(co_ratings),
            SimilarityMetric::Pearson => pearson(co_ratings),
        };
        round_score(raw)
    }
}

/// Euclidean-derived similarity, unrounded.
pub fn euclidean(co_ratings: &[(f64, f64)]) -> f64 {
    if co_ratings.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = co_ratings.iter().map(|&(a, b)| (a - b) * (a - b)).sum();
    1.0 / (1.0 + sum_sq)
}

/// Pearson correlation, unrounded.
pub fn pearson(co_ratings: &[(f64, f64)]) -> f64 {
    let n = co_ratings.len() as f64;
    if co_ratings.is_empty() {
        return 0.0;
    }

    let (mut sum_a, mut sum_b, mut sum_sq_a, mut sum_sq_b, mut sum_ab) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &(a, b) in co_ratings {
        sum_a += a;
        sum_b += b;
        sum_sq_a += a * a;
        sum_sq_b += b * b;
        sum_ab += a * b;
    }

    let numerator = sum_ab - (sum_a * sum_b) / n;
    let variance_product = (sum_sq_a - sum_a * sum_a / n) * (sum_sq_b - sum_b * sum_b / n);
    // cancellation can leave a tiny negative product for constant vectors
    if variance_product <= 0.0 {
        return 0.0;
    }
    let result = numerator / variance_product.sqrt();
    if result.is_finite() {
        result.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Merge-join two sparse rating rows on their shared indices.
///
/// Both rows must come from the same CSR orientation so their indices address
/// the same counterpart entities; sprs keeps them sorted.
pub fn co_ratings(a: &CsVecView<'_, f64>, b: &CsVecView<'_, f64>) -> Vec<(f64, f64)> {
    let (a_idx, a_val) = (a.indices(), a.data());
    let (b_idx, b_val) = (b.indices(), b.data());
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a_idx.len() && j < b_idx.len() {
        match a_idx[i].cmp(&b_idx[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push((a_val[i], b_val[j]));
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Similarity between two entities of the same kind, looked up by id.
///
/// Returns 0 when either id is unknown or the pair shares no co-participant.
pub fn similarity(
    metric: SimilarityMetric,
    matrix: &RatingMatrix,
    axis: Axis,
    a: u64,
    b: u64,
) -> f64 {
    let rows = matrix
        .index_of(axis, a)
        .zip(matrix.index_of(axis, b))
        .and_then(|(ia, ib)| matrix.vector(axis, ia).zip(matrix.vector(axis, ib)));
    match rows {
        Some((row_a, row_b)) => metric.score(&co_ratings(&row_a, &row_b)),
        None => 0.0,
    }
}

/// Cosine similarity of two dense vectors; zero-norm input yields 0 instead of NaN.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "vectors must have identical length");
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    let cos = dot / (norm_a * norm_b);
    if cos.is_nan() {
        0.0
    } else {
        cos.clamp(-1.0, 1.0)
    }
}
