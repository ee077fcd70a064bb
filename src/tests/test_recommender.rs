use std::sync::Arc;
use std::thread;

use crate::builder::RecommenderBuilder;
use crate::neighbourhood::NeighbourhoodParams;
use crate::recommender::{Algorithm, Family, Recommender, RecommenderFactory, UnknownName};
use crate::similarity::SimilarityMetric;
use crate::tests::test_data::{scenario_store, shared, synthetic_store};
use crate::tests::FAST_INCREMENTAL;

const ALL: [(Family, Algorithm); 5] = [
    (Family::MemoryBased, Algorithm::ItemBased),
    (Family::MemoryBased, Algorithm::UserBased),
    (Family::ModelBased, Algorithm::SvdUserBased),
    (Family::ModelBased, Algorithm::SvdItemBased),
    (Family::ModelBased, Algorithm::SvdIncremental),
];

#[test]
fn test_factory_builds_every_known_pair() {
    for (family, algorithm) in ALL {
        let model = RecommenderFactory::get(family, algorithm)
            .unwrap_or_else(|| panic!("{family}/{algorithm} not built"));
        assert_eq!(model.algorithm(), algorithm);
        assert!(!model.is_trained());
    }
}

#[test]
fn test_factory_rejects_mismatched_family() {
    assert!(RecommenderFactory::get(Family::ModelBased, Algorithm::ItemBased).is_none());
    assert!(RecommenderFactory::get(Family::MemoryBased, Algorithm::SvdIncremental).is_none());
}

#[test]
fn test_names_parse() {
    assert_eq!("memory_based".parse::<Family>().unwrap(), Family::MemoryBased);
    assert_eq!("product_based".parse::<Algorithm>().unwrap(), Algorithm::ItemBased);
    assert_eq!(
        "svd_product_based".parse::<Algorithm>().unwrap(),
        Algorithm::SvdItemBased
    );
    let err = "svd_magic".parse::<Algorithm>().unwrap_err();
    assert_eq!(err, UnknownName("svd_magic".to_string()));
    assert_eq!(err.to_string(), "unknown recommender name 'svd_magic'");
    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.source().is_none());

    for (family, algorithm) in ALL {
        assert_eq!(family.to_string().parse::<Family>().unwrap(), family);
        assert_eq!(algorithm.to_string().parse::<Algorithm>().unwrap(), algorithm);
        assert_eq!(algorithm.family(), family);
    }

    assert!(RecommenderFactory::by_name("model_based", "svd_incremental").is_some());
    assert!(RecommenderFactory::by_name("model_based", "user_based").is_none());
    assert!(RecommenderFactory::by_name("deep_learning", "item_based").is_none());
}

#[test]
fn test_every_variant_honours_the_lifecycle() {
    let store = shared(synthetic_store(25, 20, 0.35, 1));

    for (family, algorithm) in ALL {
        let mut model = RecommenderBuilder::new()
            .with_incremental(FAST_INCREMENTAL)
            .with_recommendation_count(Some(5))
            .build(family, algorithm)
            .unwrap();

        assert!(model.recommendations_for(1).is_empty());
        assert_eq!(model.predict_rating_for(1, 1), None);

        model.set_data(store.clone());
        model.precompute(false).unwrap();
        assert!(model.is_trained(), "{algorithm} not trained");

        for user in store.users() {
            let recs = model.recommendations_for(user.id());
            assert!(recs.len() <= 5, "{algorithm} ignored recommendation count");
            for rec in &recs {
                assert!(!user.has_rated(rec.item_id));
                assert!((1.0..=5.0).contains(&rec.estimate));
            }
            for item in store.items() {
                if let Some(p) = model.predict_rating_for(user.id(), item.id()) {
                    assert!((1.0..=5.0).contains(&p), "{algorithm} predicted {p}");
                }
            }
        }
    }
}

#[test]
fn test_builder_configuration_reaches_model() {
    let mut model = RecommenderBuilder::new()
        .with_neighbourhood(NeighbourhoodParams {
            min_similarity: 0.2,
            ..NeighbourhoodParams::default()
        })
        .with_metric(SimilarityMetric::Euclidean)
        .with_top_k(Some(1))
        .build(Family::MemoryBased, Algorithm::UserBased)
        .unwrap();
    model.set_data(shared(scenario_store()));
    model.precompute(true).unwrap();

    // user 2's neighbours were user 3 (0.5) and user 1 (0.33333); top-1 keeps user 3
    let estimate = model.predict_rating_for(2, 1);
    assert_eq!(estimate, Some(5.0));
}

#[test]
fn test_trained_model_is_shareable_across_threads() {
    let mut model = RecommenderFactory::get(Family::MemoryBased, Algorithm::ItemBased).unwrap();
    model.set_data(shared(scenario_store()));
    model.precompute(true).unwrap();
    let model: Arc<dyn Recommender> = Arc::from(model);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let model = Arc::clone(&model);
            thread::spawn(move || model.predict_rating_for(3, 2))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Some(5.0));
    }
}
