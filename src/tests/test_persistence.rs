use std::fs;

use crate::data::{Axis, RatingMatrix};
use crate::error::RecError;
use crate::incremental::{IncrementalParams, IncrementalSvd};
use crate::memory::{ItemBased, UserBased};
use crate::neighbourhood::{build_neighbourhood, NeighbourhoodParams};
use crate::persistence::{load_snapshot, save_snapshot, Snapshot};
use crate::recommender::{Algorithm, Recommender};
use crate::svd::SvdUserBased;
use crate::tests::test_data::{block_store, scenario_store, shared, synthetic_store};

#[test]
fn test_missing_file_loads_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_snapshot(&dir.path().join("absent.json")).unwrap().is_none());
}

#[test]
fn test_neighbourhood_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/dir/items.json");

    let store = synthetic_store(30, 20, 0.3, 8);
    let matrix = RatingMatrix::from_store(&store);
    let nm = build_neighbourhood(&matrix, Axis::Items, &NeighbourhoodParams::default());

    let snapshot = Snapshot::Neighbourhood {
        algorithm: Algorithm::ItemBased,
        matrix: nm.clone(),
    };
    save_snapshot(&path, &snapshot).unwrap();

    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.algorithm(), Algorithm::ItemBased);
    assert_eq!(loaded.into_neighbourhood().unwrap(), nm);
}

#[test]
fn test_save_replaces_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let matrix = RatingMatrix::from_store(&scenario_store());
    let items = build_neighbourhood(&matrix, Axis::Items, &NeighbourhoodParams::default());
    let users = build_neighbourhood(&matrix, Axis::Users, &NeighbourhoodParams::default());

    let first = Snapshot::Neighbourhood {
        algorithm: Algorithm::ItemBased,
        matrix: items,
    };
    let second = Snapshot::Neighbourhood {
        algorithm: Algorithm::UserBased,
        matrix: users,
    };
    save_snapshot(&path, &first).unwrap();
    save_snapshot(&path, &second).unwrap();

    assert_eq!(load_snapshot(&path).unwrap().unwrap(), second);
    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_failed_save_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    // a non-empty directory sits where the snapshot should go
    let target = dir.path().join("taken");
    fs::create_dir(&target).unwrap();
    fs::write(target.join("keep"), b"x").unwrap();

    let matrix = RatingMatrix::from_store(&scenario_store());
    let snapshot = Snapshot::Neighbourhood {
        algorithm: Algorithm::ItemBased,
        matrix: build_neighbourhood(&matrix, Axis::Items, &NeighbourhoodParams::default()),
    };
    let err = save_snapshot(&target, &snapshot).unwrap_err();
    assert!(matches!(err, RecError::Io(_)));

    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("taken")]);
    assert!(target.join("keep").exists());
}

#[test]
fn test_precompute_writes_then_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");

    let mut first = UserBased::default().with_snapshot(&path);
    first.set_data(shared(scenario_store()));
    first.precompute(false).unwrap();
    assert!(path.exists());

    // a reload ignores the bound data
    let mut second = UserBased::default().with_snapshot(&path);
    second.set_data(shared(block_store()));
    second.precompute(false).unwrap();
    assert_eq!(first.model(), second.model());

    // forcing recomputes from the bound data and overwrites the file
    second.precompute(true).unwrap();
    assert_ne!(first.model(), second.model());
    let on_disk = load_snapshot(&path).unwrap().unwrap().into_neighbourhood();
    assert_eq!(on_disk.as_ref(), second.model());
}

#[test]
fn test_reloaded_model_answers_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svd_users.json");
    let store = shared(block_store());

    let mut fresh = SvdUserBased::default().with_snapshot(&path);
    fresh.set_data(store.clone());
    fresh.precompute(true).unwrap();

    let mut reloaded = SvdUserBased::default().with_snapshot(&path);
    reloaded.set_data(store);
    reloaded.precompute(false).unwrap();

    assert_eq!(fresh.model(), reloaded.model());
    assert_eq!(fresh.predict_rating_for(1, 5), reloaded.predict_rating_for(1, 5));
    assert_eq!(fresh.recommendations_for(1), reloaded.recommendations_for(1));
}

#[test]
fn test_feature_tables_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.json");
    let params = IncrementalParams {
        features: 3,
        ..IncrementalParams::default()
    };

    let mut fresh = IncrementalSvd::new(params.clone()).with_snapshot(&path);
    fresh.set_data(shared(scenario_store()));
    fresh.precompute(false).unwrap();
    assert!(fresh.report().is_some());

    let mut reloaded = IncrementalSvd::new(params).with_snapshot(&path);
    reloaded.set_data(shared(scenario_store()));
    reloaded.precompute(false).unwrap();

    // loaded, not trained
    assert!(reloaded.report().is_none());
    assert_eq!(fresh.tables(), reloaded.tables());
    assert_eq!(fresh.predict_rating_for(3, 2), reloaded.predict_rating_for(3, 2));
}

#[test]
fn test_snapshot_of_another_algorithm_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");

    let mut items = ItemBased::default().with_snapshot(&path);
    items.set_data(shared(scenario_store()));
    items.precompute(false).unwrap();

    let mut users = UserBased::default().with_snapshot(&path);
    users.set_data(shared(scenario_store()));
    let err = users.precompute(false).unwrap_err();
    match err {
        RecError::SnapshotMismatch {
            expected, found, ..
        } => {
            assert_eq!(expected, "user_based");
            assert_eq!(found, "item_based");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!users.is_trained());

    let mut incremental = IncrementalSvd::default().with_snapshot(&path);
    incremental.set_data(shared(scenario_store()));
    assert!(matches!(
        incremental.precompute(false),
        Err(RecError::SnapshotMismatch { .. })
    ));

    // forcing ignores the stale file
    users.precompute(true).unwrap();
    assert!(users.is_trained());
}

#[test]
fn test_corrupt_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, b"{ not json").unwrap();

    let mut model = ItemBased::default().with_snapshot(&path);
    model.set_data(shared(scenario_store()));
    assert!(matches!(
        model.precompute(false),
        Err(RecError::Serialization(_))
    ));
    model.precompute(true).unwrap();
    assert!(model.is_trained());
}
