//! # Decomposition-based neighbourhoods
//!
//! The dense items × users rating matrix `A` (missing ratings are 0) is
//! factored as `A = U Σ Vᵗ` and only the two leading singular components are
//! kept. Rows of `U₂` place items in the plane, rows of `V₂` place users.
//!
//! An entity is folded into that plane from its raw ratings:
//!
//! ```text
//! user embedding = ratings_over_items · U₂ · Σ₂⁻¹     (compared with rows of V₂)
//! item embedding = ratings_over_users · V₂ · Σ₂⁻¹     (compared with rows of U₂)
//! ```
//!
//! Neighbours are the entities whose coordinates have cosine similarity of at
//! least `min_similarity` (0.9 by default) with the folded embedding. Entities
//! without any such neighbour get no entry in the model at all.
//!
//! Prediction reuses the weighted aggregation of the memory-based variants:
//! [`SvdUserBased`] is user oriented, [`SvdItemBased`] item oriented.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::{Array, Array2};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linalg::traits::svd::SVDDecomposable;

use crate::data::{Axis, Dataset, RatingMatrix, RatingStore};
use crate::error::{RecError, RecResult};
use crate::neighbourhood::{rank_neighbours, NeighbourhoodMatrix, SimilarityEntry};
use crate::persistence::{load_or_build, Snapshot};
use crate::prediction::{
    item_oriented_rating, item_oriented_recommendations, user_oriented_rating,
    user_oriented_recommendations,
};
use crate::recommender::{Algorithm, ModelState, Recommendation, Recommender};
use crate::similarity::cosine_similarity;
use crate::{round_score, ItemId, UserId};

/// Number of singular components kept.
pub const LATENT_DIM: usize = 2;

/// Cosine threshold for a neighbour in the latent plane.
pub const MIN_SIMILARITY_PERCENTAGE: f64 = 0.9;

pub type Coordinates = [f64; LATENT_DIM];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatentParams {
    pub min_similarity: f64,
    pub top_k: Option<usize>,
}

impl Default for LatentParams {
    fn default() -> Self {
        debug!("Creating LatentParams with default parameters");
        Self {
            min_similarity: MIN_SIMILARITY_PERCENTAGE,
            top_k: None,
        }
    }
}

impl PartialEq for LatentParams {
    fn eq(&self, other: &Self) -> bool {
        approx::relative_eq!(self.min_similarity, other.min_similarity) && self.top_k == other.top_k
    }
}

/// The two-component embedding of a rating matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct LatentSpace {
    // row i of U₂, one per item index
    items: Vec<Coordinates>,
    // row u of V₂, one per user index
    users: Vec<Coordinates>,
    singular: Coordinates,
}

impl LatentSpace {
    /// Factor the items × users matrix of `matrix`.
    ///
    /// Missing components (fewer than two items or users) are zero and fold in
    /// to zero.
    pub fn fit(matrix: &RatingMatrix) -> RecResult<Self> {
        let (n_items, n_users) = (matrix.len(Axis::Items), matrix.len(Axis::Users));
        let mut space = Self {
            items: vec![[0.0; LATENT_DIM]; n_items],
            users: vec![[0.0; LATENT_DIM]; n_users],
            singular: [0.0; LATENT_DIM],
        };
        if n_items == 0 || n_users == 0 {
            debug!("Empty rating matrix, latent space is all zeros");
            return Ok(space);
        }

        let start = Instant::now();
        info!("Decomposing {} × {} rating matrix", n_items, n_users);
        let dense = matrix.to_dense();

        // the decomposition expects at least as many rows as columns
        let (left, right, s) = if n_items >= n_users {
            let svd = dense
                .svd()
                .map_err(|e| RecError::Decomposition(e.to_string()))?;
            (svd.U, svd.V, svd.s)
        } else {
            let svd = dense
                .transpose()
                .svd()
                .map_err(|e| RecError::Decomposition(e.to_string()))?;
            (svd.V, svd.U, svd.s)
        };

        let dim = LATENT_DIM.min(s.len());
        space.singular[..dim].copy_from_slice(&s[..dim]);
        copy_leading(&left, &mut space.items, dim);
        copy_leading(&right, &mut space.users, dim);
        space.drop_null_components(n_items.max(n_users));

        info!(
            "Decomposition done in {:.3?}, leading singular values {:?}",
            start.elapsed(),
            space.singular
        );
        Ok(space)
    }

    // A component whose singular value is at rounding-noise level spans an
    // arbitrary direction of the null space; it is zeroed on both sides.
    fn drop_null_components(&mut self, size: usize) {
        let tolerance = self.singular[0] * size as f64 * f64::EPSILON;
        for c in 0..LATENT_DIM {
            if self.singular[c] > tolerance {
                continue;
            }
            debug!(
                "Dropping latent component {} (singular value {:e})",
                c, self.singular[c]
            );
            self.singular[c] = 0.0;
            for row in self.items.iter_mut().chain(self.users.iter_mut()) {
                row[c] = 0.0;
            }
        }
    }

    pub fn singular_values(&self) -> &Coordinates {
        &self.singular
    }

    pub fn item_coordinates(&self, index: usize) -> Option<&Coordinates> {
        self.items.get(index)
    }

    pub fn user_coordinates(&self, index: usize) -> Option<&Coordinates> {
        self.users.get(index)
    }

    /// Fold a user's ratings over all items into the plane.
    pub fn embed_user(&self, ratings: &[f64]) -> Coordinates {
        self.fold_in(ratings, &self.items)
    }

    /// Fold an item's ratings over all users into the plane.
    pub fn embed_item(&self, ratings: &[f64]) -> Coordinates {
        self.fold_in(ratings, &self.users)
    }

    fn fold_in(&self, ratings: &[f64], basis: &[Coordinates]) -> Coordinates {
        let mut out = [0.0; LATENT_DIM];
        for (c, value) in out.iter_mut().enumerate() {
            let s = self.singular[c];
            if s == 0.0 {
                continue;
            }
            let dot: f64 = ratings.iter().zip(basis).map(|(r, row)| r * row[c]).sum();
            *value = dot / s;
        }
        out
    }

    /// Neighbours of the entity at `index` along `axis`, in the latent plane.
    pub fn neighbours_of(
        &self,
        matrix: &RatingMatrix,
        axis: Axis,
        index: usize,
        params: &LatentParams,
    ) -> Vec<SimilarityEntry> {
        let ratings = matrix.dense_vector(axis, index);
        let (embedded, others) = match axis {
            Axis::Users => (self.embed_user(&ratings), &self.users),
            Axis::Items => (self.embed_item(&ratings), &self.items),
        };
        let ids = matrix.ids(axis);
        let scored = others
            .iter()
            .enumerate()
            .filter(|&(other, _)| other != index)
            .map(|(other, coords)| (ids[other], cosine_similarity(&embedded, coords)));
        rank_cosines(scored, params)
    }

    /// Latent neighbourhood matrix along `axis`; entities without neighbours are omitted.
    pub fn build_neighbourhood(
        &self,
        matrix: &RatingMatrix,
        axis: Axis,
        params: &LatentParams,
    ) -> NeighbourhoodMatrix {
        let start = Instant::now();
        let n = matrix.len(axis);
        info!("Creating latent {:?} neighbourhood for {} entities", axis, n);

        let ids = matrix.ids(axis);
        let rows: Vec<(u64, Vec<SimilarityEntry>)> = (0..n)
            .into_par_iter()
            .filter_map(|i| {
                let entries = self.neighbours_of(matrix, axis, i, params);
                trace!("Entity {} has {} latent neighbours", ids[i], entries.len());
                (!entries.is_empty()).then(|| (ids[i], entries))
            })
            .collect();

        let mut out = NeighbourhoodMatrix::new(axis);
        for (id, entries) in rows {
            out.insert(id, entries);
        }
        info!(
            "Latent neighbourhood built: {} of {} entities have neighbours, {:.3?}",
            out.len(),
            n,
            start.elapsed()
        );
        out
    }
}

/// Threshold raw cosine scores, then round the survivors and rank them.
pub(crate) fn rank_cosines(
    scored: impl Iterator<Item = (u64, f64)>,
    params: &LatentParams,
) -> Vec<SimilarityEntry> {
    let kept: Vec<SimilarityEntry> = scored
        .filter(|&(_, cosine)| cosine >= params.min_similarity)
        .map(|(id, cosine)| SimilarityEntry::new(id, round_score(cosine)))
        .collect();
    rank_neighbours(kept, f64::NEG_INFINITY, params.top_k)
}

fn copy_leading(factor: &DenseMatrix<f64>, rows: &mut [Coordinates], dim: usize) {
    let (n_rows, n_cols) = factor.shape();
    let dim = dim.min(n_cols);
    for (r, row) in rows.iter_mut().enumerate().take(n_rows) {
        for (c, value) in row.iter_mut().enumerate().take(dim) {
            *value = *factor.get((r, c));
        }
    }
}

fn precompute_latent(
    state: &mut ModelState<NeighbourhoodMatrix>,
    params: &LatentParams,
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
        || {
            let space = LatentSpace::fit(data.matrix())?;
            Ok(space.build_neighbourhood(data.matrix(), axis, params))
        },
        |matrix| Snapshot::Neighbourhood { algorithm, matrix },
        Snapshot::into_neighbourhood,
    )?;
    state.model = Some(model);
    Ok(())
}

fn latent_similar(
    data: Option<&Dataset>,
    params: &LatentParams,
    axis: Axis,
    id: u64,
    top: Option<usize>,
) -> RecResult<Vec<SimilarityEntry>> {
    let Some(data) = data else {
        return Ok(Vec::new());
    };
    let Some(index) = data.matrix().index_of(axis, id) else {
        return Ok(Vec::new());
    };
    let space = LatentSpace::fit(data.matrix())?;
    let params = LatentParams {
        top_k: top,
        ..params.clone()
    };
    Ok(space.neighbours_of(data.matrix(), axis, index, &params))
}

/// User-oriented recommender over the latent plane.
#[derive(Debug, Default)]
pub struct SvdUserBased {
    params: LatentParams,
    state: ModelState<NeighbourhoodMatrix>,
}

impl SvdUserBased {
    pub fn new(params: LatentParams) -> Self {
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

    pub fn params(&self) -> &LatentParams {
        &self.params
    }

    pub fn model(&self) -> Option<&NeighbourhoodMatrix> {
        self.state.model.as_ref()
    }

    /// Users closest to `user_id` in the latent plane. Refactors the bound data.
    pub fn similar_users(
        &self,
        user_id: UserId,
        top: Option<usize>,
    ) -> RecResult<Vec<SimilarityEntry>> {
        latent_similar(self.state.data.as_ref(), &self.params, Axis::Users, user_id, top)
    }
}

impl Recommender for SvdUserBased {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SvdUserBased
    }

    fn set_data(&mut self, store: Arc<RatingStore>) {
        self.state.bind(store);
    }

    fn precompute(&mut self, force_regenerate: bool) -> RecResult<()> {
        precompute_latent(
            &mut self.state,
            &self.params,
            Algorithm::SvdUserBased,
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

/// Item-oriented recommender over the latent plane.
#[derive(Debug, Default)]
pub struct SvdItemBased {
    params: LatentParams,
    state: ModelState<NeighbourhoodMatrix>,
}

impl SvdItemBased {
    pub fn new(params: LatentParams) -> Self {
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

    pub fn params(&self) -> &LatentParams {
        &self.params
    }

    pub fn model(&self) -> Option<&NeighbourhoodMatrix> {
        self.state.model.as_ref()
    }

    pub fn similar_items(
        &self,
        item_id: ItemId,
        top: Option<usize>,
    ) -> RecResult<Vec<SimilarityEntry>> {
        latent_similar(self.state.data.as_ref(), &self.params, Axis::Items, item_id, top)
    }
}

impl Recommender for SvdItemBased {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SvdItemBased
    }

    fn set_data(&mut self, store: Arc<RatingStore>) {
        self.state.bind(store);
    }

    fn precompute(&mut self, force_regenerate: bool) -> RecResult<()> {
        precompute_latent(
            &mut self.state,
            &self.params,
            Algorithm::SvdItemBased,
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
