//! Greedy top-down tree (CART with Gini impurity)

use super::tree::{class_counts, encode_training, majority, midpoint, DecisionTree, Encoded, Node};
use super::{Classifier, ClassifierFactory, TreeParams, CART};
use crate::dataset::Label;
use crate::{Error, Result};
use tracing::{debug, instrument};

/// Factory for [`GreedyTree`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyFactory;

impl ClassifierFactory for GreedyFactory {
    fn method(&self) -> &str {
        CART
    }

    fn build(&self, params: &TreeParams) -> Box<dyn Classifier> {
        Box::new(GreedyTree::new(params.max_depth))
    }
}

/// Greedy depth-limited tree
///
/// Each node takes the split with the lowest weighted Gini impurity over
/// all features and all midpoints between distinct values. Growth stops at
/// the depth limit, on pure nodes, or when no split separates the samples.
#[derive(Debug, Clone)]
pub struct GreedyTree {
    max_depth: usize,
    tree: Option<DecisionTree>,
}

impl GreedyTree {
    /// Unfitted tree with a depth limit
    #[must_use]
    pub const fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            tree: None,
        }
    }

    /// Fitted tree, if any
    #[must_use]
    pub const fn tree(&self) -> Option<&DecisionTree> {
        self.tree.as_ref()
    }
}

impl Classifier for GreedyTree {
    fn method(&self) -> &str {
        CART
    }

    #[instrument(skip_all, fields(method = CART, max_depth = self.max_depth, n_samples = features.len()))]
    fn fit(&mut self, features: &[Vec<f64>], labels: &[Label]) -> Result<()> {
        let data = encode_training(CART, self.max_depth, features, labels)?;
        let indices: Vec<usize> = (0..data.n_samples()).collect();
        let mut arena = Vec::new();
        grow(&data, &indices, 0, self.max_depth, &mut arena);
        debug!(n_nodes = arena.len(), "greedy tree built");
        self.tree = Some(DecisionTree::new(arena, data.n_features(), data.classes));
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>> {
        self.tree
            .as_ref()
            .ok_or_else(|| Error::NotFitted(CART.to_string()))?
            .predict(features)
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

// Arena pattern: reserve the parent slot, recurse, then overwrite it.
fn grow(data: &Encoded, indices: &[usize], depth: usize, max_depth: usize, arena: &mut Vec<Node>) -> usize {
    let counts = class_counts(&data.targets, indices, data.n_classes());
    let n_samples = indices.len();
    let idx = arena.len();
    arena.push(Node::Leaf {
        class: majority(&counts),
        n_samples,
    });

    let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
    if depth >= max_depth || pure || n_samples < 2 {
        return idx;
    }

    let Some(split) = best_split(data, indices) else {
        return idx;
    };

    let left = grow(data, &split.left, depth + 1, max_depth, arena);
    let right = grow(data, &split.right, depth + 1, max_depth, arena);
    arena[idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
        n_samples,
    };
    idx
}

#[allow(clippy::cast_precision_loss)]
fn gini_weighted(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let total = n as f64;
    let sum_sq: f64 = counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum();
    total * (1.0 - sum_sq)
}

/// Lowest weighted-Gini split; ties keep the first feature and threshold.
fn best_split(data: &Encoded, indices: &[usize]) -> Option<BestSplit> {
    let n = indices.len();
    let n_classes = data.n_classes();
    let parent = class_counts(&data.targets, indices, n_classes);

    let mut best: Option<(f64, usize, f64)> = None;
    let mut order = indices.to_vec();

    for (feature, column) in data.columns.iter().enumerate() {
        order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));
        let mut left = vec![0usize; n_classes];

        for pos in 1..n {
            left[data.targets[order[pos - 1]]] += 1;
            let (lo, hi) = (column[order[pos - 1]], column[order[pos]]);
            if lo >= hi {
                continue;
            }
            let right: Vec<usize> = parent.iter().zip(&left).map(|(p, l)| p - l).collect();
            let score = gini_weighted(&left, pos) + gini_weighted(&right, n - pos);
            if best.map_or(true, |(s, ..)| score < s - 1e-12) {
                best = Some((score, feature, midpoint(lo, hi)));
            }
        }
    }

    best.map(|(_, feature, threshold)| {
        let (left, right) = indices
            .iter()
            .copied()
            .partition(|&i| data.columns[feature][i] <= threshold);
        BestSplit {
            feature,
            threshold,
            left,
            right,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<Label>) {
        let features = (0..20_i32).map(|i| vec![f64::from(i), 0.0]).collect();
        let labels = (0..20_i32).map(|i| i64::from(i >= 10)).collect();
        (features, labels)
    }

    #[test]
    fn test_greedy_separable_stump() {
        let (x, y) = separable();
        let mut model = GreedyTree::new(2);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        let tree = model.tree().unwrap();
        assert_eq!(tree.depth(), 1);
        match &tree.nodes()[0] {
            Node::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, 0);
                assert!((threshold - 9.5).abs() < f64::EPSILON);
            }
            Node::Leaf { .. } => panic!("expected a split at the root"),
        }
    }

    #[test]
    fn test_greedy_respects_depth() {
        // Alternating labels need many splits; depth caps growth.
        let x: Vec<Vec<f64>> = (0..16_i32).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<Label> = (0..16_i32).map(|i| i64::from(i % 2)).collect();
        let mut model = GreedyTree::new(3);
        model.fit(&x, &y).unwrap();
        assert!(model.tree().unwrap().depth() <= 3);
    }

    #[test]
    fn test_greedy_separates_adjacent_floats() {
        let lo = f64::from_bits(1.0_f64.to_bits() + 1);
        let hi = f64::from_bits(lo.to_bits() + 1);
        let x = vec![vec![lo], vec![lo], vec![hi], vec![hi]];
        let y = vec![0, 0, 1, 1];
        let mut model = GreedyTree::new(1);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_greedy_single_class() {
        let x = vec![vec![1.0], vec![2.0]];
        let mut model = GreedyTree::new(3);
        model.fit(&x, &[4, 4]).unwrap();
        assert_eq!(model.tree().unwrap().leaf_count(), 1);
        assert_eq!(model.predict(&[vec![100.0]]).unwrap(), vec![4]);
    }

    #[test]
    fn test_greedy_predict_before_fit() {
        let model = GreedyTree::new(2);
        assert!(matches!(
            model.predict(&[vec![1.0]]).unwrap_err(),
            Error::NotFitted(_)
        ));
    }

    #[test]
    fn test_greedy_zero_depth() {
        let mut model = GreedyTree::new(0);
        assert!(matches!(
            model.fit(&[vec![1.0]], &[1]).unwrap_err(),
            Error::InvalidDepth(0)
        ));
    }

    #[test]
    fn test_gini_weighted() {
        assert!(gini_weighted(&[5, 0], 5).abs() < f64::EPSILON);
        assert!((gini_weighted(&[2, 2], 4) - 2.0).abs() < 1e-12);
    }
}
