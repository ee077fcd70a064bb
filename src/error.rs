//! Error types for rating-store mutation, model precomputation and snapshot I/O.
//!
//! Query paths (`predict_rating_for`, `recommendations_for`) never fail: they
//! answer with `None` or an empty list when no estimate can be made.

use std::path::PathBuf;

use thiserror::Error;

use crate::{ItemId, UserId};

#[derive(Debug, Error)]
pub enum RecError {
    #[error("user {0} is not present in the rating store")]
    UnknownUser(UserId),

    #[error("item {0} is not present in the rating store")]
    UnknownItem(ItemId),

    #[error("rating {value} given by user {user} to item {item} is outside [1, 5]")]
    RatingOutOfRange {
        user: UserId,
        item: ItemId,
        value: f64,
    },

    /// `precompute` was called before `set_data`.
    #[error("no rating data bound to the recommender")]
    MissingData,

    #[error("matrix decomposition failed: {0}")]
    Decomposition(String),

    #[error("snapshot {path:?} holds a {found} model, expected {expected}")]
    SnapshotMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot (de)serialisation failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenient result alias for fallible recommender operations.
pub type RecResult<T> = Result<T, RecError>;
