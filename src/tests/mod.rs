mod test_data;
mod test_data_store;
mod test_persistence;
mod test_recommender;

use crate::incremental::IncrementalParams;

/// Small trainer configuration that converges in a few hundred sweeps.
pub const FAST_INCREMENTAL: IncrementalParams = IncrementalParams {
    features: 1,
    init_value: 0.1,
    min_sweeps: 10,
    max_sweeps: 2000,
    min_improvement: 0.0001,
    learning_rate: 0.01,
    regularization: 0.015,
};
