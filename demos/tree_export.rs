//! Tree Export Example
//!
//! Fits a depth-2 exact tree and prints it in Graphviz DOT format.
//! Pipe the output to `dot -Tpng` to render it.
//!
//! Run with: cargo run --example tree_export

use treebench::classifier::{Classifier, OptimalTree};

fn main() {
    // XOR on two features: no single split helps, depth 2 is exact
    let features: Vec<Vec<f64>> = (0..40_i32)
        .map(|i| vec![f64::from(i % 2), f64::from((i / 2) % 2)])
        .collect();
    let labels: Vec<i64> = features
        .iter()
        .map(|row| i64::from((row[0] > 0.5) != (row[1] > 0.5)))
        .collect();

    let mut tree = OptimalTree::exact(2);
    tree.fit(&features, &labels).unwrap();
    eprintln!("training errors: {:?}", tree.training_errors());

    let names = vec!["same".to_string(), "different".to_string()];
    let dot = tree.tree().unwrap().export_dot(Some(&names));
    print!("{dot}");
}
