use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use ratingspace::data::{Axis, RatingMatrix, RatingStore};
use ratingspace::incremental::{train, IncrementalParams};
use ratingspace::neighbourhood::{build_neighbourhood, NeighbourhoodParams};
use ratingspace::svd::{LatentParams, LatentSpace};
use ratingspace::SimilarityMetric;
use std::hint::black_box;
use std::time::Duration;

fn synthetic_store(n_users: u64, n_items: u64, density: f64, seed: u64) -> RatingStore {
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

fn bench_neighbourhood(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighbourhood");
    group.warm_up_time(Duration::from_millis(300));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    for &(users, items) in &[(200u64, 100u64), (500, 300)] {
        let store = synthetic_store(users, items, 0.05, 42);
        let matrix = RatingMatrix::from_store(&store);
        let label = format!("{users}x{items}");

        for metric in [SimilarityMetric::Euclidean, SimilarityMetric::Pearson] {
            let params = NeighbourhoodParams {
                metric,
                top_k: Some(20),
                ..NeighbourhoodParams::default()
            };
            group.bench_function(
                BenchmarkId::new(format!("items_{metric:?}"), &label),
                |b| b.iter(|| black_box(build_neighbourhood(&matrix, Axis::Items, &params))),
            );
        }
        group.bench_function(BenchmarkId::new("users_Euclidean", &label), |b| {
            b.iter(|| {
                black_box(build_neighbourhood(
                    &matrix,
                    Axis::Users,
                    &NeighbourhoodParams::default(),
                ))
            })
        });
    }
    group.finish();
}

fn bench_latent(c: &mut Criterion) {
    let mut group = c.benchmark_group("latent");
    group.sample_size(10);

    let store = synthetic_store(150, 80, 0.1, 7);
    let matrix = RatingMatrix::from_store(&store);

    group.bench_function("svd_fit", |b| {
        b.iter(|| black_box(LatentSpace::fit(&matrix).unwrap()))
    });

    let space = LatentSpace::fit(&matrix).unwrap();
    group.bench_function("svd_user_neighbourhood", |b| {
        b.iter(|| {
            black_box(space.build_neighbourhood(&matrix, Axis::Users, &LatentParams::default()))
        })
    });

    let params = IncrementalParams {
        features: 3,
        ..IncrementalParams::default()
    };
    group.bench_function("incremental_train", |b| {
        b.iter_batched(
            || store.clone(),
            |s| black_box(train(&s, &params)),
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_neighbourhood, bench_latent);
criterion_main!(benches);
