//! Grid Search Example
//!
//! Tunes the depth limit of each builder with 5-fold cross-validation on
//! the training split, then reports the held-out score of the refit winner.
//!
//! Run with: cargo run --example grid_search

use treebench::classifier::MethodRegistry;
use treebench::dataset::Dataset;
use treebench::search::{GridSearch, ParamGrid, DEFAULT_FOLDS};
use treebench::split::SplitGenerator;

fn staircase(n: u32) -> Dataset {
    let features: Vec<Vec<f64>> = (0..n)
        .map(|i| vec![f64::from(i % 20), f64::from((i * 13) % 31)])
        .collect();
    let labels = features
        .iter()
        .map(|row| i64::from((row[0] >= 6.0 && row[1] < 20.0) || row[0] >= 15.0))
        .collect();
    Dataset::new("staircase", features, labels).unwrap()
}

fn main() {
    println!("=== treebench: Grid Search ===\n");

    let dataset = staircase(250);
    let split = SplitGenerator::new(0.3).unwrap().split_dataset(&dataset, 42).unwrap();
    let train = split.train(&dataset);
    let test = split.test(&dataset);

    let grid = ParamGrid::from_json(&serde_json::json!({ "max_depth": [1, 2, 3] })).unwrap();
    let methods = MethodRegistry::builtin().detect(None).unwrap();

    for factory in methods.factories() {
        let fitted = GridSearch::new(factory.as_ref(), grid.clone())
            .folds(DEFAULT_FOLDS)
            .seed(42)
            .fit(&train.features, &train.labels)
            .unwrap();

        println!("{}:", factory.method());
        for candidate in fitted.candidates() {
            println!(
                "  depth {} -> mean CV accuracy {:.2}%",
                candidate.params.max_depth, candidate.mean_score
            );
        }
        println!(
            "  best depth {} (CV {:.2}%), held-out accuracy {:.2}%\n",
            fitted.best_params().max_depth,
            fitted.best_score(),
            fitted.score(&test.features, &test.labels).unwrap()
        );
    }
}
