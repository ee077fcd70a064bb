//! The lifecycle every algorithm variant honours, and variant selection.
//!
//! ```text
//! set_data(store) -> precompute(force) -> { predict_rating_for, recommendations_for }*
//! ```
//!
//! Queries issued before a successful `precompute` answer `None` / an empty
//! list. After `precompute` the model is immutable, so a trained recommender
//! can be shared across threads for read-only queries.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::RecommenderBuilder;
use crate::data::{Dataset, RatingStore};
use crate::error::{RecError, RecResult};
use crate::{ItemId, UserId};

/// A recommended item with its estimated rating.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub estimate: f64,
}

impl Recommendation {
    pub fn new(item_id: ItemId, estimate: f64) -> Self {
        Self { item_id, estimate }
    }
}

pub trait Recommender: Send + Sync {
    /// Which algorithm this instance runs.
    fn algorithm(&self) -> Algorithm;

    /// Bind the rating store. Any previously trained model is discarded.
    fn set_data(&mut self, store: Arc<RatingStore>);

    /// Build the model, or load it from the configured snapshot when one exists
    /// and `force_regenerate` is false. A freshly built model is written back to
    /// the snapshot path if one is configured.
    fn precompute(&mut self, force_regenerate: bool) -> RecResult<()>;

    /// Items the user has not rated, best estimate first.
    fn recommendations_for(&self, user_id: UserId) -> Vec<Recommendation>;

    /// Estimated rating in `[1, 5]`, or `None` when no estimate can be made.
    fn predict_rating_for(&self, user_id: UserId, item_id: ItemId) -> Option<f64>;

    /// Whether `precompute` has produced a model for the bound data.
    fn is_trained(&self) -> bool;
}

/// Error returned when a family or algorithm name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown recommender name '{0}'")]
pub struct UnknownName(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    MemoryBased,
    ModelBased,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::MemoryBased => "memory_based",
            Family::ModelBased => "model_based",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory_based" => Ok(Family::MemoryBased),
            "model_based" => Ok(Family::ModelBased),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    ItemBased,
    UserBased,
    SvdUserBased,
    SvdItemBased,
    SvdIncremental,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::ItemBased => "item_based",
            Algorithm::UserBased => "user_based",
            Algorithm::SvdUserBased => "svd_user_based",
            Algorithm::SvdItemBased => "svd_item_based",
            Algorithm::SvdIncremental => "svd_incremental",
        }
    }

    /// The family this algorithm belongs to.
    pub fn family(self) -> Family {
        match self {
            Algorithm::ItemBased | Algorithm::UserBased => Family::MemoryBased,
            Algorithm::SvdUserBased | Algorithm::SvdItemBased | Algorithm::SvdIncremental => {
                Family::ModelBased
            }
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item_based" | "product_based" => Ok(Algorithm::ItemBased),
            "user_based" => Ok(Algorithm::UserBased),
            "svd_user_based" => Ok(Algorithm::SvdUserBased),
            "svd_item_based" | "svd_product_based" => Ok(Algorithm::SvdItemBased),
            "svd_incremental" => Ok(Algorithm::SvdIncremental),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

/// Builds a recommender with default parameters from a (family, algorithm) key.
pub struct RecommenderFactory;

impl RecommenderFactory {
    /// `None` when the algorithm does not belong to the family.
    pub fn get(family: Family, algorithm: Algorithm) -> Option<Box<dyn Recommender>> {
        RecommenderBuilder::new().build(family, algorithm)
    }

    /// Like [`RecommenderFactory::get`], keyed by names such as
    /// `("model_based", "svd_incremental")`.
    pub fn by_name(family: &str, algorithm: &str) -> Option<Box<dyn Recommender>> {
        let family = family.parse().ok()?;
        let algorithm = algorithm.parse().ok()?;
        Self::get(family, algorithm)
    }
}

/// Bound data plus the trained model of one recommender instance.
#[derive(Clone, Debug)]
pub(crate) struct ModelState<M> {
    pub data: Option<Dataset>,
    pub model: Option<M>,
    pub snapshot: Option<PathBuf>,
    pub recommendation_count: Option<usize>,
}

impl<M> Default for ModelState<M> {
    fn default() -> Self {
        Self {
            data: None,
            model: None,
            snapshot: None,
            recommendation_count: None,
        }
    }
}

impl<M> ModelState<M> {
    pub fn bind(&mut self, store: Arc<RatingStore>) {
        self.data = Some(Dataset::new(store));
        self.model = None;
    }

    pub fn data(&self) -> RecResult<&Dataset> {
        self.data.as_ref().ok_or(RecError::MissingData)
    }

    /// Bound data and model, once both exist.
    pub fn trained(&self) -> Option<(&Dataset, &M)> {
        self.data.as_ref().zip(self.model.as_ref())
    }
}
