//! Memory-based collaborative filtering.
//!
//! Both variants keep a [`NeighbourhoodMatrix`] built from raw co-ratings:
//! [`ItemBased`] relates items through their shared raters, [`UserBased`]
//! relates users through the items they both rated.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};

use crate::data::{Axis, Dataset, RatingStore};
use crate::error::RecResult;
use crate::neighbourhood::{
    build_neighbourhood, neighbours_of, NeighbourhoodMatrix, NeighbourhoodParams,
    SimilarityEntry,
};
use crate::persistence::{load_or_build, Snapshot};
use crate::prediction::{
    item_oriented_rating, item_oriented_recommendations, user_oriented_rating,
    user_oriented_recommendations,
};
use crate::recommender::{Algorithm, ModelState, Recommendation, Recommender};
use crate::{ItemId, UserId};

/// Build or reload the neighbourhood matrix of a memory-based variant.
fn precompute_neighbourhood(
    state: &mut ModelState<NeighbourhoodMatrix>,
    params: &NeighbourhoodParams,
    algorithm: Algorithm,
    axis: Axis,
    force: bool,
) -> RecResult<()> {
    let data = state.data()?;
    info!("Precomputing {} model (force={})", algorithm, force);
    let model = load_or_build(
        state.snapshot.as_deref(),
        force,
        algorithm,
        || Ok(build_neighbourhood(data.matrix(), axis, params)),
        |matrix| Snapshot::Neighbourhood { algorithm, matrix },
        Snapshot::into_neighbourhood,
    )?;
    debug!("{} model covers {} entities", algorithm, model.len());
    state.model = Some(model);
    Ok(())
}

/// On-demand neighbour list of one entity, truncated to `top`.
fn similar_along(
    data: Option<&Dataset>,
    params: &NeighbourhoodParams,
    axis: Axis,
    id: u64,
    top: Option<usize>,
) -> Vec<SimilarityEntry> {
    let Some(data) = data else {
        return Vec::new();
    };
    let Some(index) = data.matrix().index_of(axis, id) else {
        return Vec::new();
    };
    let params = NeighbourhoodParams {
        top_k: top,
        ..params.clone()
    };
    neighbours_of(data.matrix(), axis, index, &params)
}

/// Item-item neighbourhood recommender.
///
/// A rating estimate for `(user, item)` is the similarity-weighted mean of the
/// user's ratings on the item's neighbours.
#[derive(Debug, Default)]
pub struct ItemBased {
    params: NeighbourhoodParams,
    state: ModelState<NeighbourhoodMatrix>,
}

impl ItemBased {
    pub fn new(params: NeighbourhoodParams) -> Self {
        Self {
            params,
            state: ModelState::default(),
        }
    }

    /// Cap recommendation lists at `count` entries.
    pub fn with_recommendation_count(mut self, count: Option<usize>) -> Self {
        self.state.recommendation_count = count;
        self
    }

    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.state.snapshot = Some(path.into());
        self
    }

    pub fn params(&self) -> &NeighbourhoodParams {
        &self.params
    }

    pub fn model(&self) -> Option<&NeighbourhoodMatrix> {
        self.state.model.as_ref()
    }

    /// Items most similar to `item_id`, computed from the bound data without a
    /// trained model.
    pub fn similar_items(&self, item_id: ItemId, top: Option<usize>) -> Vec<SimilarityEntry> {
        similar_along(self.state.data.as_ref(), &self.params, Axis::Items, item_id, top)
    }
}

impl Recommender for ItemBased {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ItemBased
    }

    fn set_data(&mut self, store: Arc<RatingStore>) {
        self.state.bind(store);
    }

    fn precompute(&mut self, force_regenerate: bool) -> RecResult<()> {
        precompute_neighbourhood(
            &mut self.state,
            &self.params,
            Algorithm::ItemBased,
            Axis::Items,
            force_regenerate,
        )
    }

    fn recommendations_for(&self, user_id: UserId) -> Vec<Recommendation> {
        match self.state.trained() {
            Some((data, model)) => item_oriented_recommendations(
                data.store(),
                model,
                user_id,
                self.state.recommendation_count,
            ),
            None => Vec::new(),
        }
    }

    fn predict_rating_for(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        let (data, model) = self.state.trained()?;
        item_oriented_rating(data.store(), model, user_id, item_id)
    }

    fn is_trained(&self) -> bool {
        self.state.model.is_some()
    }
}

/// User-user neighbourhood recommender.
///
/// Estimates weight the target item's ratings by the raters' similarity to the
/// active user. Recommendation candidates come from the most similar user only.
#[derive(Debug, Default)]
pub struct UserBased {
    params: NeighbourhoodParams,
    state: ModelState<NeighbourhoodMatrix>,
}

impl UserBased {
    pub fn new(params: NeighbourhoodParams) -> Self {
        Self {
            params,
            state: ModelState::default(),
        }
    }

    pub fn with_recommendation_count(mut self, count: Option<usize>) -> Self {
        self.state.recommendation_count = count;
        self
    }

    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.state.snapshot = Some(path.into());
        self
    }

    pub fn params(&self) -> &NeighbourhoodParams {
        &self.params
    }

    pub fn model(&self) -> Option<&NeighbourhoodMatrix> {
        self.state.model.as_ref()
    }

    pub fn similar_users(&self, user_id: UserId, top: Option<usize>) -> Vec<SimilarityEntry> {
        similar_along(self.state.data.as_ref(), &self.params, Axis::Users, user_id, top)
    }
}

impl Recommender for UserBased {
    fn algorithm(&self) -> Algorithm {
        Algorithm::UserBased
    }

    fn set_data(&mut self, store: Arc<RatingStore>) {
        self.state.bind(store);
    }

    fn precompute(&mut self, force_regenerate: bool) -> RecResult<()> {
        precompute_neighbourhood(
            &mut self.state,
            &self.params,
            Algorithm::UserBased,
            Axis::Users,
            force_regenerate,
        )
    }

    fn recommendations_for(&self, user_id: UserId) -> Vec<Recommendation> {
        match self.state.trained() {
            Some((data, model)) => user_oriented_recommendations(
                data.store(),
                model,
                user_id,
                self.state.recommendation_count,
            ),
            None => Vec::new(),
        }
    }

    fn predict_rating_for(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        let (data, model) = self.state.trained()?;
        user_oriented_rating(data.store(), model, user_id, item_id)
    }

    fn is_trained(&self) -> bool {
        self.state.model.is_some()
    }
}
