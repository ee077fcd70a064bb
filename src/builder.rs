use std::path::PathBuf;

use crate::incremental::{IncrementalParams, IncrementalSvd};
use crate::memory::{ItemBased, UserBased};
use crate::neighbourhood::NeighbourhoodParams;
use crate::recommender::{Algorithm, Family, Recommender};
use crate::similarity::SimilarityMetric;
use crate::svd::{LatentParams, SvdItemBased, SvdUserBased};

use log::{debug, info, warn};

pub struct RecommenderBuilder {
    // Memory-based neighbourhood parameters
    neighbourhood: NeighbourhoodParams,
    // Decomposition-based neighbourhood parameters
    latent: LatentParams,
    // Gradient-descent trainer parameters
    incremental: IncrementalParams,

    // Output shaping
    recommendation_count: Option<usize>,

    // Where the trained model is persisted, if anywhere
    snapshot: Option<PathBuf>,
}

impl Default for RecommenderBuilder {
    fn default() -> Self {
        debug!("Creating RecommenderBuilder with default parameters");
        Self {
            neighbourhood: NeighbourhoodParams::default(),
            latent: LatentParams::default(),
            incremental: IncrementalParams::default(),
            recommendation_count: None,
            snapshot: None,
        }
    }
}

impl RecommenderBuilder {
    pub fn new() -> Self {
        info!("Initializing new RecommenderBuilder");
        Self::default()
    }

    // -------------------- Neighbourhood configuration --------------------

    pub fn with_neighbourhood(mut self, params: NeighbourhoodParams) -> Self {
        info!(
            "Configuring neighbourhood: metric={:?}, min_similarity={}, top_k={:?}",
            params.metric, params.min_similarity, params.top_k
        );
        self.neighbourhood = params;
        self
    }

    /// Shortcut for the memory-based similarity metric.
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        info!("Setting similarity metric: {:?}", metric);
        self.neighbourhood.metric = metric;
        self
    }

    pub fn with_latent(mut self, params: LatentParams) -> Self {
        info!(
            "Configuring latent neighbourhood: min_similarity={}, top_k={:?}",
            params.min_similarity, params.top_k
        );
        self.latent = params;
        self
    }

    pub fn with_incremental(mut self, params: IncrementalParams) -> Self {
        info!("Configuring incremental trainer: {:?}", params);
        self.incremental = params;
        self
    }

    /// Cap every neighbour list (memory and latent) at `k` entries.
    pub fn with_top_k(mut self, k: Option<usize>) -> Self {
        info!("Setting neighbour cap: {:?}", k);
        self.neighbourhood.top_k = k;
        self.latent.top_k = k;
        self
    }

    // -------------------- Output and persistence --------------------

    pub fn with_recommendation_count(mut self, count: Option<usize>) -> Self {
        info!("Setting recommendation count: {:?}", count);
        self.recommendation_count = count;
        self
    }

    /// Persist the trained model at `path` and reload it on later runs.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Using model snapshot at {:?}", path);
        self.snapshot = Some(path);
        self
    }

    // -------------------- Build --------------------

    /// Instantiate the recommender selected by `(family, algorithm)`.
    ///
    /// Returns `None` when the algorithm does not belong to the family.
    pub fn build(self, family: Family, algorithm: Algorithm) -> Option<Box<dyn Recommender>> {
        if algorithm.family() != family {
            warn!("No {} algorithm in the {} family", algorithm, family);
            return None;
        }
        debug!(
            "Building {} recommender: recommendation_count={:?}, snapshot={:?}",
            algorithm, self.recommendation_count, self.snapshot
        );

        let count = self.recommendation_count;
        let recommender: Box<dyn Recommender> = match algorithm {
            Algorithm::ItemBased => Box::new(with_snapshot(
                ItemBased::new(self.neighbourhood).with_recommendation_count(count),
                self.snapshot,
                |r, p| r.with_snapshot(p),
            )),
            Algorithm::UserBased => Box::new(with_snapshot(
                UserBased::new(self.neighbourhood).with_recommendation_count(count),
                self.snapshot,
                |r, p| r.with_snapshot(p),
            )),
            Algorithm::SvdUserBased => Box::new(with_snapshot(
                SvdUserBased::new(self.latent).with_recommendation_count(count),
                self.snapshot,
                |r, p| r.with_snapshot(p),
            )),
            Algorithm::SvdItemBased => Box::new(with_snapshot(
                SvdItemBased::new(self.latent).with_recommendation_count(count),
                self.snapshot,
                |r, p| r.with_snapshot(p),
            )),
            Algorithm::SvdIncremental => Box::new(with_snapshot(
                IncrementalSvd::new(self.incremental).with_recommendation_count(count),
                self.snapshot,
                |r, p| r.with_snapshot(p),
            )),
        };
        info!("{} recommender ready", algorithm);
        Some(recommender)
    }
}

fn with_snapshot<R>(recommender: R, path: Option<PathBuf>, attach: fn(R, PathBuf) -> R) -> R {
    match path {
        Some(path) => attach(recommender, path),
        None => recommender,
    }
}
