use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::data::{Rating, RatingStore};

/// Three users, three items; nobody rated item 3.
///
/// ```text
///        I1  I2  I3
///   U1    5   3   -
///   U2    4   2   -
///   U3    5   -   -
/// ```
pub fn scenario_store() -> RatingStore {
    let mut store = RatingStore::from_ratings([
        Rating::new(1, 1, 5.0),
        Rating::new(1, 2, 3.0),
        Rating::new(2, 1, 4.0),
        Rating::new(2, 2, 2.0),
        Rating::new(3, 1, 5.0),
    ])
    .unwrap();
    store.add_item(3, "I-3");
    store
}

/// Two disconnected blocks of raters.
///
/// Block A: users 1-2 over items 1, 2, 5. Block B: users 3-5 rate items 3, 4, 6
/// with 5. The leading singular component is block B (15), the second block A
/// (about 9.31).
pub fn block_store() -> RatingStore {
    let mut ratings = vec![
        Rating::new(1, 1, 5.0),
        Rating::new(1, 2, 4.0),
        Rating::new(2, 1, 5.0),
        Rating::new(2, 2, 4.0),
        Rating::new(2, 5, 3.0),
    ];
    for user in 3..=5 {
        for item in [3, 4, 6] {
            ratings.push(Rating::new(user, item, 5.0));
        }
    }
    RatingStore::from_ratings(ratings).unwrap()
}

/// Two users rating two shared items identically.
pub fn uniform_store() -> RatingStore {
    RatingStore::from_ratings([
        Rating::new(1, 1, 4.0),
        Rating::new(1, 2, 4.0),
        Rating::new(2, 1, 4.0),
        Rating::new(2, 2, 4.0),
    ])
    .unwrap()
}

/// Random integer ratings; each (user, item) pair is rated with probability `density`.
pub fn synthetic_store(n_users: u64, n_items: u64, density: f64, seed: u64) -> RatingStore {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut store = RatingStore::new();
    for user in 1..=n_users {
        for item in 1..=n_items {
            if rng.gen_bool(density) {
                let value = rng.gen_range(1..=5) as f64;
                store.add_rating(user, item, value).unwrap();
            }
        }
    }
    store
}

pub fn shared(store: RatingStore) -> Arc<RatingStore> {
    Arc::new(store)
}
