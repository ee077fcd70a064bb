use crate::data::{Axis, Rating, RatingMatrix, RatingStore};
use crate::error::RecError;
use crate::tests::test_data::scenario_store;

use smartcore::linalg::basic::arrays::Array;

#[test]
fn test_add_rating_registers_entities() {
    let mut store = RatingStore::new();
    store.add_rating(7, 11, 4.0).unwrap();

    assert_eq!(store.num_users(), 1);
    assert_eq!(store.num_items(), 1);
    assert_eq!(store.user(7).unwrap().name(), "U-7");
    assert_eq!(store.item(11).unwrap().name(), "I-11");
    assert_eq!(store.user(7).unwrap().rating_for(11), Some(4.0));
}

#[test]
fn test_rerating_overwrites() {
    let mut store = scenario_store();
    store.add_rating(1, 1, 2.0).unwrap();

    let user = store.user(1).unwrap();
    assert_eq!(user.rating_for(1), Some(2.0));
    assert_eq!(user.rated().len(), 2);
    assert_eq!(store.num_ratings(), 5);
}

#[test]
fn test_rating_out_of_range_is_rejected() {
    let mut store = RatingStore::new();
    let err = store.add_rating(1, 1, 5.5).unwrap_err();
    assert!(matches!(err, RecError::RatingOutOfRange { user: 1, item: 1, .. }));

    let err = store.add_rating(1, 1, 0.0).unwrap_err();
    assert!(matches!(err, RecError::RatingOutOfRange { .. }));
}

#[test]
fn test_rate_requires_registered_entities() {
    let mut store = RatingStore::new();
    store.add_user(1, "alice");

    assert!(matches!(store.rate(1, 9, 3.0), Err(RecError::UnknownItem(9))));

    store.add_item(9, "book");
    assert!(matches!(store.rate(2, 9, 3.0), Err(RecError::UnknownUser(2))));
    store.rate(1, 9, 3.0).unwrap();
    assert!(store.user(1).unwrap().has_rated(9));
}

#[test]
fn test_add_user_keeps_ratings() {
    let mut store = scenario_store();
    store.add_user(1, "renamed");

    let user = store.user(1).unwrap();
    assert_eq!(user.name(), "renamed");
    assert_eq!(user.rated().len(), 2);
}

#[test]
fn test_unrate() {
    let mut store = scenario_store();
    assert_eq!(store.unrate(2, 2), Some(2.0));
    assert_eq!(store.unrate(2, 2), None);
    assert_eq!(store.unrate(42, 1), None);
    assert_eq!(store.num_ratings(), 4);
}

#[test]
fn test_ratings_are_ordered() {
    let store = scenario_store();
    let ratings: Vec<Rating> = store.ratings().collect();
    let keys: Vec<(u64, u64)> = ratings.iter().map(|r| (r.user_id, r.item_id)).collect();
    assert_eq!(keys, vec![(1, 1), (1, 2), (2, 1), (2, 2), (3, 1)]);
}

#[test]
fn test_matrix_rows_along_both_axes() {
    let store = scenario_store();
    let matrix = RatingMatrix::from_store(&store);

    assert_eq!(matrix.ids(Axis::Items), &[1, 2, 3]);
    assert_eq!(matrix.ids(Axis::Users), &[1, 2, 3]);
    assert_eq!(matrix.nnz(), 5);

    // raters of item 1
    let i1 = matrix.index_of(Axis::Items, 1).unwrap();
    let raters = matrix.vector(Axis::Items, i1).unwrap();
    assert_eq!(raters.indices(), &[0, 1, 2]);
    assert_eq!(raters.data(), &[5.0, 4.0, 5.0]);

    // item 3 has no raters
    let i3 = matrix.index_of(Axis::Items, 3).unwrap();
    assert_eq!(matrix.vector(Axis::Items, i3).unwrap().nnz(), 0);

    // items of user 2
    let u2 = matrix.index_of(Axis::Users, 2).unwrap();
    assert_eq!(matrix.dense_vector(Axis::Users, u2), vec![4.0, 2.0, 0.0]);
}

#[test]
fn test_to_dense_is_items_by_users() {
    let store = scenario_store();
    let dense = RatingMatrix::from_store(&store).to_dense();

    assert_eq!(dense.shape(), (3, 3));
    assert_eq!(*dense.get((0, 2)), 5.0); // item 1, user 3
    assert_eq!(*dense.get((1, 0)), 3.0); // item 2, user 1
    assert_eq!(*dense.get((1, 2)), 0.0);
    assert_eq!(*dense.get((2, 0)), 0.0);
}
