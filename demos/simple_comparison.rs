//! Simple Comparison Example
//!
//! Fits the exact and greedy builders on one synthetic dataset and one
//! seeded split, then prints train/test accuracy side by side.
//!
//! Run with: cargo run --example simple_comparison

use treebench::classifier::{Classifier, GreedyTree, OptimalTree};
use treebench::dataset::Dataset;
use treebench::experiment::TrialSpec;
use treebench::split::{repetition_seed, SplitGenerator};
use treebench::trial::execute_trial;

/// Two noisy interleaved bands: label flips when both features cross.
fn bands(n: u32) -> Dataset {
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n {
        let x = f64::from(i % 17);
        let y = f64::from((i * 11) % 19);
        let noise = i % 23 == 0;
        let label = ((x > 8.0) ^ (y > 9.0)) ^ noise;
        features.push(vec![x, y, f64::from(i % 5)]);
        labels.push(i64::from(label));
    }
    Dataset::new("bands", features, labels).unwrap()
}

fn main() {
    println!("=== treebench: Optimal vs CART ===\n");

    let dataset = bands(400);
    println!(
        "Dataset: {} ({} samples, {} features, majority {:.1}%)",
        dataset.display_name(),
        dataset.n_samples(),
        dataset.n_features(),
        dataset.majority_fraction() * 100.0
    );

    let split = SplitGenerator::new(0.2)
        .unwrap()
        .split_dataset(&dataset, repetition_seed(42, 1))
        .unwrap();
    let train = split.train(&dataset);
    let test = split.test(&dataset);
    println!("Split: {} train / {} test\n", train.len(), test.len());

    println!("{:<10} {:>5} {:>10} {:>10} {:>10}", "Method", "Depth", "Train %", "Test %", "Fit (s)");
    for depth in 1..=3 {
        let mut contenders: Vec<Box<dyn Classifier>> = vec![
            Box::new(OptimalTree::exact(depth)),
            Box::new(GreedyTree::new(depth)),
        ];
        for classifier in &mut contenders {
            let spec = TrialSpec {
                dataset: dataset.display_name(),
                method: classifier.method().to_string(),
                depth,
                run: 1,
            };
            let result = execute_trial(&spec, classifier.as_mut(), &train, &test).unwrap();
            println!(
                "{:<10} {:>5} {:>10.2} {:>10.2} {:>10.4}",
                result.method(),
                depth,
                result.train_accuracy(),
                result.test_accuracy(),
                result.runtime()
            );
        }
    }

    println!("\nThe exact builder never trains worse than CART at the same depth.");
}
