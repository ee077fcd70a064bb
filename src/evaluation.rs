//! Held-out evaluation.
//!
//! RMSE is taken over the held-out ratings the model can predict; undefined
//! predictions are counted as skipped, never as zero error.

use log::info;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{Rating, RatingStore};
use crate::recommender::Recommender;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rmse: f64,
    /// Held-out ratings with a defined prediction.
    pub predicted: usize,
    /// Held-out ratings the model could not predict.
    pub skipped: usize,
}

/// Compare every held-out rating against `model`'s prediction.
///
/// `None` when no held-out rating could be predicted.
pub fn evaluate<R>(model: &R, held_out: &[Rating]) -> Option<EvaluationReport>
where
    R: Recommender + ?Sized,
{
    let squared: Vec<f64> = held_out
        .par_iter()
        .filter_map(|r| {
            model
                .predict_rating_for(r.user_id, r.item_id)
                .map(|p| (r.value - p) * (r.value - p))
        })
        .collect();

    let predicted = squared.len();
    let skipped = held_out.len() - predicted;
    if predicted == 0 {
        info!("No held-out rating could be predicted ({} skipped)", skipped);
        return None;
    }

    let rmse = (squared.iter().sum::<f64>() / predicted as f64).sqrt();
    info!(
        "{} evaluation: rmse={:.5} over {} predictions, {} skipped",
        model.algorithm(),
        rmse,
        predicted,
        skipped
    );
    Some(EvaluationReport {
        rmse,
        predicted,
        skipped,
    })
}

/// Split off a random `test_fraction` of the ratings.
///
/// The returned store keeps every user and item, minus the held-out ratings.
/// The same seed always yields the same split.
pub fn holdout_split(
    store: &RatingStore,
    test_fraction: f64,
    seed: u64,
) -> (RatingStore, Vec<Rating>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut ratings: Vec<Rating> = store.ratings().collect();
    ratings.shuffle(&mut rng);

    let n_test = (test_fraction.clamp(0.0, 1.0) * ratings.len() as f64) as usize;
    ratings.truncate(n_test);

    let mut train = store.clone();
    for rating in &ratings {
        train.unrate(rating.user_id, rating.item_id);
    }
    info!(
        "Held out {} of {} ratings (seed {})",
        ratings.len(),
        store.num_ratings(),
        seed
    );
    (train, ratings)
}
