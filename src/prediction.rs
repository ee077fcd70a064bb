//! Weighted aggregation over a neighbourhood matrix.
//!
//! Every neighbourhood-backed recommender estimates a rating the same way:
//! each neighbour with a known rating contributes `rating · |similarity|` to a
//! weighted sum and `|similarity|` to a normalising sum; the estimate is their
//! ratio clamped to `[1, 5]`, and undefined when either sum is zero.
//!
//! Two orientations exist:
//! - **item oriented**: neighbours are items, the counterpart ratings come from
//!   the active user.
//! - **user oriented**: neighbours are users, each contributing their own rating
//!   of the target item. Recommendation candidates are restricted to the items of
//!   the single most similar user, while the weighting still runs over every
//!   neighbour.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::trace;

use crate::data::RatingStore;
use crate::neighbourhood::NeighbourhoodMatrix;
use crate::recommender::Recommendation;
use crate::{clamp_rating, ItemId, UserId};

#[derive(Clone, Copy, Debug, Default)]
pub struct WeightedSum {
    weighted: f64,
    norm: f64,
}

impl WeightedSum {
    pub fn add(&mut self, rating: f64, similarity: f64) {
        self.weighted += rating * similarity.abs();
        self.norm += similarity.abs();
    }

    /// Clamped estimate, or `None` when nothing contributed.
    pub fn estimate(&self) -> Option<f64> {
        if self.weighted == 0.0 || self.norm == 0.0 {
            return None;
        }
        Some(clamp_rating(self.weighted / self.norm))
    }
}

/// Estimate `user_id`'s rating of `item_id` from the item's neighbours that the
/// user has rated.
pub fn item_oriented_rating(
    store: &RatingStore,
    items: &NeighbourhoodMatrix,
    user_id: UserId,
    item_id: ItemId,
) -> Option<f64> {
    let user = store.user(user_id)?;
    let neighbours = items.neighbours(item_id)?;

    let mut sum = WeightedSum::default();
    for entry in neighbours {
        if let Some(rating) = user.rating_for(entry.id) {
            sum.add(rating, entry.similarity);
        }
    }
    sum.estimate()
}

/// Rank every unrated neighbour of the user's rated items.
pub fn item_oriented_recommendations(
    store: &RatingStore,
    items: &NeighbourhoodMatrix,
    user_id: UserId,
    count: Option<usize>,
) -> Vec<Recommendation> {
    let Some(user) = store.user(user_id) else {
        return Vec::new();
    };

    let mut sums: BTreeMap<ItemId, WeightedSum> = BTreeMap::new();
    for (rated_item, rating) in user.rated().iter() {
        let Some(neighbours) = items.neighbours(rated_item) else {
            continue;
        };
        for entry in neighbours {
            if user.has_rated(entry.id) {
                continue;
            }
            sums.entry(entry.id).or_default().add(rating, entry.similarity);
        }
    }
    trace!("User {} has {} candidate items", user_id, sums.len());
    rank(sums, count)
}

/// Estimate `user_id`'s rating of `item_id` from similar users who rated it.
pub fn user_oriented_rating(
    store: &RatingStore,
    users: &NeighbourhoodMatrix,
    user_id: UserId,
    item_id: ItemId,
) -> Option<f64> {
    let neighbours = users.neighbours(user_id)?;

    let mut sum = WeightedSum::default();
    for entry in neighbours {
        let rating = store.user(entry.id).and_then(|n| n.rating_for(item_id));
        if let Some(rating) = rating {
            sum.add(rating, entry.similarity);
        }
    }
    sum.estimate()
}

/// Rank the top neighbour's items the user has not rated, weighting each over
/// every neighbour who rated it.
pub fn user_oriented_recommendations(
    store: &RatingStore,
    users: &NeighbourhoodMatrix,
    user_id: UserId,
    count: Option<usize>,
) -> Vec<Recommendation> {
    let Some(user) = store.user(user_id) else {
        return Vec::new();
    };
    let Some(neighbours) = users.neighbours(user_id) else {
        return Vec::new();
    };
    let Some(top) = neighbours.first().and_then(|e| store.user(e.id)) else {
        return Vec::new();
    };

    let mut sums: BTreeMap<ItemId, WeightedSum> = BTreeMap::new();
    for (candidate, _) in top.rated().iter() {
        if user.has_rated(candidate) {
            continue;
        }
        for entry in neighbours {
            let rating = store.user(entry.id).and_then(|n| n.rating_for(candidate));
            if let Some(rating) = rating {
                sums.entry(candidate).or_default().add(rating, entry.similarity);
            }
        }
    }
    trace!(
        "User {} has {} candidate items from top neighbour {}",
        user_id,
        sums.len(),
        top.id()
    );
    rank(sums, count)
}

/// Sort recommendations by descending estimate, ties by ascending item id.
pub fn sort_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_unstable_by(|a, b| {
        b.estimate
            .partial_cmp(&a.estimate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
}

fn rank(sums: BTreeMap<ItemId, WeightedSum>, count: Option<usize>) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = sums
        .into_iter()
        .filter_map(|(item_id, sum)| sum.estimate().map(|e| Recommendation::new(item_id, e)))
        .collect();
    sort_recommendations(&mut out);
    if let Some(n) = count {
        out.truncate(n);
    }
    out
}
