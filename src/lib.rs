//! # ratingspace
//!
//! Collaborative-filtering recommenders over explicit `(user, item, rating)`
//! observations. Two families of algorithms share one lifecycle:
//!
//! - **memory based**: item-item or user-user neighbourhoods computed from raw
//!   co-ratings with a Euclidean-derived or Pearson similarity.
//! - **model based**: neighbourhoods computed in a 2-component SVD embedding
//!   (user-oriented or item-oriented), and an incremental latent-factor model
//!   trained feature by feature with regularised gradient descent.
//!
//! Every variant implements [`Recommender`]: bind a [`RatingStore`] with
//! `set_data`, build the model once with `precompute` (optionally persisted to a
//! snapshot file), then issue any number of `predict_rating_for` /
//! `recommendations_for` queries against the immutable model.
//!
//! ```
//! use std::sync::Arc;
//! use ratingspace::{Algorithm, Family, RatingStore, Recommender, RecommenderFactory};
//!
//! let mut store = RatingStore::new();
//! for (user, item, rating) in [(1, 1, 5.0), (1, 2, 3.0), (2, 1, 4.0), (2, 2, 2.0), (3, 1, 5.0)] {
//!     store.add_rating(user, item, rating).unwrap();
//! }
//!
//! let mut model = RecommenderFactory::get(Family::MemoryBased, Algorithm::ItemBased).unwrap();
//! model.set_data(Arc::new(store));
//! model.precompute(true).unwrap();
//!
//! let estimate = model.predict_rating_for(3, 2).unwrap();
//! assert!((1.0..=5.0).contains(&estimate));
//! ```
//!
//! Precomputation is CPU bound and synchronous; run it on a worker thread when
//! the caller needs to stay responsive and share the resulting model read-only.

pub mod builder;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod incremental;
pub mod memory;
pub mod neighbourhood;
pub mod persistence;
pub mod prediction;
pub mod recommender;
pub mod similarity;
pub mod svd;

#[cfg(test)]
mod tests;

pub use builder::RecommenderBuilder;
pub use data::{Axis, Item, Rating, RatingMatrix, RatingStore, User};
pub use error::{RecError, RecResult};
pub use neighbourhood::{NeighbourhoodMatrix, NeighbourhoodParams, SimilarityEntry};
pub use recommender::{Algorithm, Family, Recommendation, Recommender, RecommenderFactory};
pub use similarity::SimilarityMetric;

/// Alias for user identifiers.
pub type UserId = u64;
/// Alias for item identifiers.
pub type ItemId = u64;

/// Lowest rating on the scale.
pub const RATING_MIN: f64 = 1.0;
/// Highest rating on the scale.
pub const RATING_MAX: f64 = 5.0;

/// Decimal digits kept on every stored similarity score.
pub const SCORE_PRECISION: i32 = 5;

/// Clamp an estimate into `[RATING_MIN, RATING_MAX]`.
#[inline]
pub fn clamp_rating(rating: f64) -> f64 {
    rating.clamp(RATING_MIN, RATING_MAX)
}

/// Round a similarity score to `SCORE_PRECISION` decimal digits.
#[inline]
pub fn round_score(score: f64) -> f64 {
    let factor = 10f64.powi(SCORE_PRECISION);
    (score * factor).round() / factor
}
