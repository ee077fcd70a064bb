//! Rating store and its sparse index.
//!
//! [`RatingStore`] is the plain data model the ingestion side fills in: users,
//! items and each user's rated-item collection. Recommenders only read it.
//!
//! [`RatingMatrix`] is derived from a store once per precomputation. It keeps
//! two CSR views of the same ratings (items × users and users × items) so that
//! the raters of an item and the items of a user are both a single row lookup,
//! and it exports the dense items × users matrix the SVD trainer factors.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;
use sprs::{CsMat, CsVecView, TriMat};

use crate::error::{RecError, RecResult};
use crate::{ItemId, UserId, RATING_MAX, RATING_MIN};

/// A single `(user, item, rating)` observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub value: f64,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, value: f64) -> Self {
        Self {
            user_id,
            item_id,
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    name: String,
}

impl Item {
    pub fn new(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.id, self.name)
    }
}

/// The items one user has rated, keyed by item id.
///
/// A user rates an item at most once; inserting again replaces the value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RatedItems {
    ratings: BTreeMap<ItemId, f64>,
}

impl RatedItems {
    pub fn insert(&mut self, item_id: ItemId, value: f64) {
        self.ratings.insert(item_id, value);
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.ratings.contains_key(&item_id)
    }

    pub fn get(&self, item_id: ItemId) -> Option<f64> {
        self.ratings.get(&item_id).copied()
    }

    pub fn remove(&mut self, item_id: ItemId) -> Option<f64> {
        self.ratings.remove(&item_id)
    }

    /// Iterate `(item_id, rating)` pairs in ascending item order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, f64)> + '_ {
        self.ratings.iter().map(|(&id, &value)| (id, value))
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    rated: RatedItems,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            rated: RatedItems::default(),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rated(&self) -> &RatedItems {
        &self.rated
    }

    pub fn has_rated(&self, item_id: ItemId) -> bool {
        self.rated.contains(item_id)
    }

    pub fn rating_for(&self, item_id: ItemId) -> Option<f64> {
        self.rated.get(item_id)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User({}): {}", self.id, self.name)
    }
}

/// Users, items and ratings, as handed over by the ingestion side.
///
/// Iteration order over users and items is ascending by id, which keeps every
/// derived structure (matrix rows, training sweeps) deterministic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingStore {
    users: BTreeMap<UserId, User>,
    items: BTreeMap<ItemId, Item>,
}

impl RatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from rating triples, creating users `U-<id>` and items
    /// `I-<id>` on first sight.
    pub fn from_ratings<I>(ratings: I) -> RecResult<Self>
    where
        I: IntoIterator<Item = Rating>,
    {
        let mut store = Self::new();
        for rating in ratings {
            store.add_rating(rating.user_id, rating.item_id, rating.value)?;
        }
        debug!(
            "Rating store built: {} users, {} items, {} ratings",
            store.num_users(),
            store.num_items(),
            store.num_ratings()
        );
        Ok(store)
    }

    /// Register a user; an existing user with the same id keeps its ratings.
    pub fn add_user(&mut self, id: UserId, name: impl Into<String>) {
        match self.users.get_mut(&id) {
            Some(user) => user.name = name.into(),
            None => {
                self.users.insert(id, User::new(id, name));
            }
        }
    }

    pub fn add_item(&mut self, id: ItemId, name: impl Into<String>) {
        self.items.insert(id, Item::new(id, name));
    }

    /// Record a rating, registering unknown users and items on the way.
    pub fn add_rating(&mut self, user_id: UserId, item_id: ItemId, value: f64) -> RecResult<()> {
        if !self.items.contains_key(&item_id) {
            self.add_item(item_id, format!("I-{item_id}"));
        }
        if !self.users.contains_key(&user_id) {
            self.add_user(user_id, format!("U-{user_id}"));
        }
        self.rate(user_id, item_id, value)
    }

    /// Record a rating between a registered user and a registered item.
    pub fn rate(&mut self, user_id: UserId, item_id: ItemId, value: f64) -> RecResult<()> {
        if !(RATING_MIN..=RATING_MAX).contains(&value) {
            return Err(RecError::RatingOutOfRange {
                user: user_id,
                item: item_id,
                value,
            });
        }
        if !self.items.contains_key(&item_id) {
            return Err(RecError::UnknownItem(item_id));
        }
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or(RecError::UnknownUser(user_id))?;
        user.rated.insert(item_id, value);
        Ok(())
    }

    /// Drop a rating, returning its value if it existed.
    pub fn unrate(&mut self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        self.users.get_mut(&user_id)?.rated.remove(item_id)
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> + '_ {
        self.users.values()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.values()
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn num_ratings(&self) -> usize {
        self.users.values().map(|u| u.rated.len()).sum()
    }

    /// All ratings, ordered by user id then item id.
    pub fn ratings(&self) -> impl Iterator<Item = Rating> + '_ {
        self.users.values().flat_map(|user| {
            user.rated
                .iter()
                .map(move |(item_id, value)| Rating::new(user.id, item_id, value))
        })
    }
}

/// Which kind of entity is being compared.
///
/// `Items` compares items with each other, their co-participants being the
/// users who rated both. `Users` compares users through co-rated items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Items,
    Users,
}

impl Axis {
    pub fn counterpart(self) -> Axis {
        match self {
            Axis::Items => Axis::Users,
            Axis::Users => Axis::Items,
        }
    }
}

/// Sparse, index-addressed view of a [`RatingStore`].
#[derive(Clone, Debug)]
pub struct RatingMatrix {
    user_ids: Vec<UserId>,
    item_ids: Vec<ItemId>,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    // items × users: row i lists the raters of item i
    by_item: CsMat<f64>,
    // users × items: row u lists the items rated by user u
    by_user: CsMat<f64>,
}

impl RatingMatrix {
    pub fn from_store(store: &RatingStore) -> Self {
        let user_ids: Vec<UserId> = store.users.keys().copied().collect();
        let item_ids: Vec<ItemId> = store.items.keys().copied().collect();
        let user_index: HashMap<UserId, usize> =
            user_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let item_index: HashMap<ItemId, usize> =
            item_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let (n_users, n_items) = (user_ids.len(), item_ids.len());
        let mut item_major: TriMat<f64> = TriMat::new((n_items, n_users));
        let mut user_major: TriMat<f64> = TriMat::new((n_users, n_items));

        for rating in store.ratings() {
            // ratings referencing items the store never registered are skipped
            let (Some(&u), Some(&i)) = (
                user_index.get(&rating.user_id),
                item_index.get(&rating.item_id),
            ) else {
                trace!("Skipping dangling rating {:?}", rating);
                continue;
            };
            item_major.add_triplet(i, u, rating.value);
            user_major.add_triplet(u, i, rating.value);
        }

        let by_item: CsMat<f64> = item_major.to_csr();
        let by_user: CsMat<f64> = user_major.to_csr();
        debug!(
            "Rating matrix: {} items × {} users, {} non-zeros",
            n_items,
            n_users,
            by_item.nnz()
        );

        Self {
            user_ids,
            item_ids,
            user_index,
            item_index,
            by_item,
            by_user,
        }
    }

    /// Ids along `axis`, in ascending order; position is the row index.
    pub fn ids(&self, axis: Axis) -> &[u64] {
        match axis {
            Axis::Items => &self.item_ids,
            Axis::Users => &self.user_ids,
        }
    }

    pub fn len(&self, axis: Axis) -> usize {
        self.ids(axis).len()
    }

    pub fn index_of(&self, axis: Axis, id: u64) -> Option<usize> {
        match axis {
            Axis::Items => self.item_index.get(&id).copied(),
            Axis::Users => self.user_index.get(&id).copied(),
        }
    }

    /// Ratings attached to entity `index` along `axis`, as a sparse vector
    /// indexed by the counterpart axis. For an item: its raters.
    pub fn vector(&self, axis: Axis, index: usize) -> Option<CsVecView<'_, f64>> {
        match axis {
            Axis::Items => self.by_item.outer_view(index),
            Axis::Users => self.by_user.outer_view(index),
        }
    }

    pub fn nnz(&self) -> usize {
        self.by_item.nnz()
    }

    /// Dense items × users matrix, missing ratings filled with 0.
    pub fn to_dense(&self) -> DenseMatrix<f64> {
        let (n_items, n_users) = (self.item_ids.len(), self.user_ids.len());
        let mut flat = vec![0.0; n_items * n_users];
        for (i, row) in self.by_item.outer_iterator().enumerate() {
            for (u, &value) in row.iter() {
                flat[i * n_users + u] = value;
            }
        }
        DenseMatrix::from_iterator(flat.into_iter(), n_items, n_users, 0)
    }

    /// Dense ratings of one entity along the counterpart axis (zeros where missing).
    pub fn dense_vector(&self, axis: Axis, index: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.len(axis.counterpart())];
        if let Some(row) = self.vector(axis, index) {
            for (j, &value) in row.iter() {
                out[j] = value;
            }
        }
        out
    }
}

/// A rating store bound to a recommender, with its sparse index built once.
#[derive(Clone, Debug)]
pub struct Dataset {
    store: Arc<RatingStore>,
    matrix: RatingMatrix,
}

impl Dataset {
    pub fn new(store: Arc<RatingStore>) -> Self {
        let matrix = RatingMatrix::from_store(&store);
        Self { store, matrix }
    }

    pub fn store(&self) -> &RatingStore {
        &self.store
    }

    pub fn matrix(&self) -> &RatingMatrix {
        &self.matrix
    }
}
