//! # Incremental latent-factor model
//!
//! Learns `F` feature dimensions one after the other with regularised gradient
//! descent over the known ratings.
//!
//! For feature `f` every sweep visits each `(user, item, rating)` triple:
//!
//! ```text
//! estimate = clamp(cache + u_f · i_f + (F - f - 2) · init²)      // f is 0-based
//! error    = rating - estimate
//! u_f     += lr · (error · i_f - k · u_f)
//! i_f     += lr · (error · u_f - k · i_f)                       // both use pre-update weights
//! ```
//!
//! `cache` holds the clamped estimate from the features already trained (1.0
//! before the first one) and the last term biases the estimate for the features
//! not trained yet. Sweeping continues while fewer than `min_sweeps` have run
//! or the RMSE still improves by at least `min_improvement`. The cap is exact:
//! a feature stops after its `max_sweeps`-th sweep even while it still improves,
//! rather than allowing one sweep past the cap. The cache is then refreshed
//! without the trailing term.
//!
//! A prediction starts from 1 and adds `u_f · i_f` feature by feature, clamping
//! to `[1, 5]` after every addition, exactly as the training estimate does.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::data::{Rating, RatingStore};
use crate::error::RecResult;
use crate::persistence::{load_or_build, Snapshot};
use crate::prediction::sort_recommendations;
use crate::recommender::{Algorithm, ModelState, Recommendation, Recommender};
use crate::{clamp_rating, ItemId, UserId, RATING_MIN};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalParams {
    /// Number of latent features.
    pub features: usize,
    /// Initial value of every weight.
    pub init_value: f64,
    pub min_sweeps: usize,
    /// Hard cap on sweeps per feature.
    pub max_sweeps: usize,
    pub min_improvement: f64,
    pub learning_rate: f64,
    /// Regularisation factor `k`.
    pub regularization: f64,
}

impl Default for IncrementalParams {
    fn default() -> Self {
        debug!("Creating IncrementalParams with default parameters");
        Self {
            features: 10,
            init_value: 0.1,
            min_sweeps: 50,
            max_sweeps: 100,
            min_improvement: 0.0001,
            learning_rate: 0.001,
            regularization: 0.015,
        }
    }
}

// Custom PartialEq implementation using approximate equality for floats
impl PartialEq for IncrementalParams {
    fn eq(&self, other: &Self) -> bool {
        self.features == other.features
            && approx::relative_eq!(self.init_value, other.init_value)
            && self.min_sweeps == other.min_sweeps
            && self.max_sweeps == other.max_sweeps
            && approx::relative_eq!(self.min_improvement, other.min_improvement)
            && approx::relative_eq!(self.learning_rate, other.learning_rate)
            && approx::relative_eq!(self.regularization, other.regularization)
    }
}

/// Per-feature user and item weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureTables {
    users: Vec<BTreeMap<UserId, f64>>,
    items: Vec<BTreeMap<ItemId, f64>>,
}

impl FeatureTables {
    /// Tables for `features` dimensions with every weight set to `init_value`.
    pub fn new(features: usize, init_value: f64, user_ids: &[UserId], item_ids: &[ItemId]) -> Self {
        let fill = |ids: &[u64]| ids.iter().map(|&id| (id, init_value)).collect::<BTreeMap<_, _>>();
        Self {
            users: vec![fill(user_ids); features],
            items: vec![fill(item_ids); features],
        }
    }

    pub fn features(&self) -> usize {
        self.users.len()
    }

    pub fn user_weight(&self, feature: usize, user_id: UserId) -> Option<f64> {
        self.users.get(feature)?.get(&user_id).copied()
    }

    pub fn item_weight(&self, feature: usize, item_id: ItemId) -> Option<f64> {
        self.items.get(feature)?.get(&item_id).copied()
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.users.first().is_some_and(|t| t.contains_key(&user_id))
    }

    /// Factor prediction; `None` for ids the tables have never seen.
    pub fn predict(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        let mut rating = RATING_MIN;
        for (users, items) in self.users.iter().zip(&self.items) {
            let u = users.get(&user_id)?;
            let i = items.get(&item_id)?;
            rating = clamp_rating(rating + u * i);
        }
        Some(rating)
    }
}

/// Convergence record of one feature.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub sweeps: usize,
    /// RMSE after each sweep.
    pub history: Vec<f64>,
}

impl FeatureReport {
    pub fn rmse(&self) -> Option<f64> {
        self.history.last().copied()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub features: Vec<FeatureReport>,
}

impl TrainingReport {
    pub fn total_sweeps(&self) -> usize {
        self.features.iter().map(|f| f.sweeps).sum()
    }

    pub fn final_rmse(&self) -> Option<f64> {
        self.features.iter().rev().find_map(FeatureReport::rmse)
    }
}

fn estimate(cached: f64, product: f64, trailing: f64) -> f64 {
    let base = if cached != 0.0 { cached } else { 1.0 };
    clamp_rating(base + product + trailing)
}

/// Train feature tables on every rating of `store`.
pub fn train(store: &RatingStore, params: &IncrementalParams) -> (FeatureTables, TrainingReport) {
    let start = Instant::now();
    let user_ids: Vec<UserId> = store.users().map(|u| u.id()).collect();
    let item_ids: Vec<ItemId> = store.items().map(|i| i.id()).collect();
    let user_index: HashMap<UserId, usize> =
        user_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let item_index: HashMap<ItemId, usize> =
        item_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let triples: Vec<(usize, usize, f64)> = store
        .ratings()
        .filter_map(|Rating { user_id, item_id, value }| {
            Some((*user_index.get(&user_id)?, *item_index.get(&item_id)?, value))
        })
        .collect();

    info!(
        "Training {} features over {} ratings ({} users, {} items)",
        params.features,
        triples.len(),
        user_ids.len(),
        item_ids.len()
    );
    debug!("Incremental parameters: {:?}", params);

    let init = params.init_value;
    let mut user_w = vec![vec![init; user_ids.len()]; params.features];
    let mut item_w = vec![vec![init; item_ids.len()]; params.features];
    let mut cache = vec![0.0; triples.len()];
    let mut report = TrainingReport::default();

    let (mut last_rmse, mut rmse) = (2.0_f64, 2.0_f64);
    let n = triples.len() as f64;

    for f in 0..params.features {
        if triples.is_empty() {
            debug!("No ratings to train on");
            break;
        }
        let trailing = (params.features as f64 - f as f64 - 2.0) * init * init;
        let (uw, iw) = (&mut user_w[f], &mut item_w[f]);
        let mut feature = FeatureReport::default();

        while feature.sweeps < params.min_sweeps || rmse <= last_rmse - params.min_improvement {
            if feature.sweeps >= params.max_sweeps {
                debug!("Feature {} hit the sweep cap of {}", f, params.max_sweeps);
                break;
            }
            last_rmse = rmse;
            let mut sq_error = 0.0;
            for (t, &(u, i, value)) in triples.iter().enumerate() {
                let (u_val, i_val) = (uw[u], iw[i]);
                let err = value - estimate(cache[t], u_val * i_val, trailing);
                sq_error += err * err;
                uw[u] += params.learning_rate * (err * i_val - params.regularization * u_val);
                iw[i] += params.learning_rate * (err * u_val - params.regularization * i_val);
            }
            rmse = (sq_error / n).sqrt();
            feature.sweeps += 1;
            feature.history.push(rmse);
            trace!("Feature {} sweep {}: rmse={:.6}", f, feature.sweeps, rmse);
        }

        for (t, &(u, i, _)) in triples.iter().enumerate() {
            cache[t] = estimate(cache[t], uw[u] * iw[i], 0.0);
        }
        info!(
            "Feature {} converged after {} sweeps, rmse={:.6}",
            f, feature.sweeps, rmse
        );
        report.features.push(feature);
    }

    fn to_table(ids: &[u64], weights: &[f64]) -> BTreeMap<u64, f64> {
        ids.iter().copied().zip(weights.iter().copied()).collect()
    }
    let tables = FeatureTables {
        users: user_w.iter().map(|w| to_table(&user_ids, w)).collect(),
        items: item_w.iter().map(|w| to_table(&item_ids, w)).collect(),
    };
    info!(
        "Incremental training done: {} sweeps in {:.3?}",
        report.total_sweeps(),
        start.elapsed()
    );
    (tables, report)
}

/// Latent-factor recommender trained by [`train`].
#[derive(Debug, Default)]
pub struct IncrementalSvd {
    params: IncrementalParams,
    state: ModelState<FeatureTables>,
    report: Option<TrainingReport>,
}

impl IncrementalSvd {
    pub fn new(params: IncrementalParams) -> Self {
        Self {
            params,
            state: ModelState::default(),
            report: None,
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

    pub fn params(&self) -> &IncrementalParams {
        &self.params
    }

    pub fn tables(&self) -> Option<&FeatureTables> {
        self.state.model.as_ref()
    }

    /// Convergence history of the last training run; `None` when the model
    /// was loaded from a snapshot or not trained yet.
    pub fn report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }
}

impl Recommender for IncrementalSvd {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SvdIncremental
    }

    fn set_data(&mut self, store: Arc<RatingStore>) {
        self.state.bind(store);
        self.report = None;
    }

    fn precompute(&mut self, force_regenerate: bool) -> RecResult<()> {
        let data = self.state.data()?;
        let params = &self.params;
        let mut report = None;
        let tables = load_or_build(
            self.state.snapshot.as_deref(),
            force_regenerate,
            Algorithm::SvdIncremental,
            || {
                let (tables, trained) = train(data.store(), params);
                report = Some(trained);
                Ok(tables)
            },
            |tables| Snapshot::Features { tables },
            Snapshot::into_features,
        )?;
        self.state.model = Some(tables);
        self.report = report;
        Ok(())
    }

    fn recommendations_for(&self, user_id: UserId) -> Vec<Recommendation> {
        let Some((data, tables)) = self.state.trained() else {
            return Vec::new();
        };
        let store = data.store();
        let Some(user) = store.user(user_id) else {
            return Vec::new();
        };
        if !tables.knows_user(user_id) {
            return Vec::new();
        }

        let mut out: Vec<Recommendation> = store
            .items()
            .filter(|item| !user.has_rated(item.id()))
            .filter_map(|item| {
                tables
                    .predict(user_id, item.id())
                    .map(|estimate| Recommendation::new(item.id(), estimate))
            })
            .collect();
        sort_recommendations(&mut out);
        if let Some(n) = self.state.recommendation_count {
            out.truncate(n);
        }
        out
    }

    fn predict_rating_for(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        let (_, tables) = self.state.trained()?;
        tables.predict(user_id, item_id)
    }

    fn is_trained(&self) -> bool {
        self.state.model.is_some()
    }
}
