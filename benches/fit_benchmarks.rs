//! Tree fitting benchmarks
//!
//! Compares fit time of the builders as depth and sample count grow:
//! - exact optimal search (every midpoint)
//! - optimal search over quantile thresholds
//! - greedy CART
//!
//! Run with: cargo bench --bench fit_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use treebench::classifier::{Classifier, GreedyTree, OptimalTree, TreeParams, OPTIMAL_BINNED};

/// Deterministic dataset with `n` rows, 4 features and a depth-2 rule
fn dataset(n: u32) -> (Vec<Vec<f64>>, Vec<i64>) {
    let features: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            vec![
                f64::from((i * 7) % 53),
                f64::from((i * 13) % 41),
                f64::from(i % 17),
                f64::from((i * 29) % 11),
            ]
        })
        .collect();
    let labels = features
        .iter()
        .map(|row| i64::from((row[0] > 25.0) != (row[1] > 20.0)))
        .collect();
    (features, labels)
}

fn bench_fit_by_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_by_depth");
    group.sample_size(10);
    let (features, labels) = dataset(300);

    for depth in [1_usize, 2, 3] {
        group.bench_with_input(BenchmarkId::new("cart", depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut tree = GreedyTree::new(depth);
                tree.fit(black_box(&features), black_box(&labels)).unwrap();
            });
        });
        group.bench_with_input(BenchmarkId::new("optimal_binned", depth), &depth, |b, &depth| {
            b.iter(|| {
                let params = TreeParams {
                    max_thresholds: Some(10),
                    ..TreeParams::with_depth(depth)
                };
                let mut tree = OptimalTree::new(OPTIMAL_BINNED, params);
                tree.fit(black_box(&features), black_box(&labels)).unwrap();
            });
        });
    }
    for depth in [1_usize, 2, 3] {
        group.bench_with_input(BenchmarkId::new("optimal", depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut tree = OptimalTree::exact(depth);
                tree.fit(black_box(&features), black_box(&labels)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_fit_by_samples(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_by_samples");
    group.sample_size(10);

    for n in [100_u32, 1_000, 5_000] {
        let (features, labels) = dataset(n);
        group.bench_with_input(BenchmarkId::new("cart_depth3", n), &n, |b, _| {
            b.iter(|| {
                let mut tree = GreedyTree::new(3);
                tree.fit(black_box(&features), black_box(&labels)).unwrap();
            });
        });
        group.bench_with_input(BenchmarkId::new("optimal_depth2", n), &n, |b, _| {
            b.iter(|| {
                let mut tree = OptimalTree::exact(2);
                tree.fit(black_box(&features), black_box(&labels)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let (features, labels) = dataset(5_000);
    let mut tree = GreedyTree::new(4);
    tree.fit(&features, &labels).unwrap();

    c.bench_function("predict_5k_depth4", |b| {
        b.iter(|| tree.predict(black_box(&features)).unwrap());
    });
}

criterion_group!(benches, bench_fit_by_depth, bench_fit_by_samples, bench_predict);
criterion_main!(benches);
