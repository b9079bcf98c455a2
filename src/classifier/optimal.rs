//! Exhaustive depth-bounded trees
//!
//! Finds the tree of depth at most `max_depth` with the fewest training
//! misclassifications among all axis-aligned threshold trees whose
//! thresholds come from a per-feature candidate list:
//!
//! - every midpoint between consecutive distinct training values (exact), or
//! - at most `max_thresholds` midpoints chosen at sample quantiles (binned).
//!
//! The search itself lives in `solver`.

use super::solver::Search;
use super::tree::{encode_training, midpoint, DecisionTree};
use super::{Availability, Classifier, ClassifierFactory, TreeParams, OPTIMAL, OPTIMAL_BINNED};
use crate::dataset::Label;
use crate::{Error, Result};
use tracing::{debug, info, instrument};

/// Default candidate thresholds per feature for the binned method
pub const DEFAULT_BINNED_THRESHOLDS: usize = 10;

/// Factory for the exact optimal tree
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimalFactory;

impl ClassifierFactory for OptimalFactory {
    fn method(&self) -> &str {
        OPTIMAL
    }

    fn build(&self, params: &TreeParams) -> Box<dyn Classifier> {
        Box::new(OptimalTree::new(OPTIMAL, *params))
    }
}

/// Factory for the quantile-threshold optimal tree (`binned` feature)
#[derive(Debug, Clone, Copy)]
pub struct BinnedFactory {
    n_thresholds: usize,
}

impl BinnedFactory {
    /// Factory using `n_thresholds` candidates per feature
    #[must_use]
    pub const fn new(n_thresholds: usize) -> Self {
        Self { n_thresholds }
    }
}

impl Default for BinnedFactory {
    fn default() -> Self {
        Self::new(DEFAULT_BINNED_THRESHOLDS)
    }
}

impl ClassifierFactory for BinnedFactory {
    fn method(&self) -> &str {
        OPTIMAL_BINNED
    }

    fn availability(&self) -> Availability {
        if cfg!(feature = "binned") {
            Availability::Available
        } else {
            Availability::Unavailable("built without the `binned` feature".to_string())
        }
    }

    fn build(&self, params: &TreeParams) -> Box<dyn Classifier> {
        let params = TreeParams {
            max_thresholds: Some(params.max_thresholds.unwrap_or(self.n_thresholds)),
            ..*params
        };
        Box::new(OptimalTree::new(OPTIMAL_BINNED, params))
    }
}

/// Misclassification-optimal tree under a depth limit
#[derive(Debug, Clone)]
pub struct OptimalTree {
    method: &'static str,
    params: TreeParams,
    tree: Option<DecisionTree>,
    training_errors: Option<usize>,
}

impl OptimalTree {
    /// Unfitted tree reporting results under `method`
    #[must_use]
    pub const fn new(method: &'static str, params: TreeParams) -> Self {
        Self {
            method,
            params,
            tree: None,
            training_errors: None,
        }
    }

    /// Exact search with the given depth limit
    #[must_use]
    pub const fn exact(max_depth: usize) -> Self {
        Self::new(OPTIMAL, TreeParams::with_depth(max_depth))
    }

    /// Fitted tree, if any
    #[must_use]
    pub const fn tree(&self) -> Option<&DecisionTree> {
        self.tree.as_ref()
    }

    /// Misclassified training samples of the fitted tree
    #[must_use]
    pub const fn training_errors(&self) -> Option<usize> {
        self.training_errors
    }
}

impl Classifier for OptimalTree {
    fn method(&self) -> &str {
        self.method
    }

    #[instrument(skip_all, fields(method = self.method, max_depth = self.params.max_depth, n_samples = features.len()))]
    fn fit(&mut self, features: &[Vec<f64>], labels: &[Label]) -> Result<()> {
        let data = encode_training(self.method, self.params.max_depth, features, labels)?;
        let thresholds = data
            .columns
            .iter()
            .map(|column| candidate_thresholds(column, self.params.max_thresholds))
            .collect();
        let solution = Search::new(&data, thresholds, self.params.max_depth, self.params.verbose).run();
        if self.params.verbose {
            info!(training_errors = solution.cost, "optimal tree found");
        } else {
            debug!(training_errors = solution.cost, "optimal tree found");
        }

        self.training_errors = Some(solution.cost);
        self.tree = Some(DecisionTree::new(solution.into_nodes(), data.n_features(), data.classes));
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>> {
        self.tree
            .as_ref()
            .ok_or_else(|| Error::NotFitted(self.method.to_string()))?
            .predict(features)
    }
}

/// Midpoints between distinct values, optionally thinned to quantiles.
///
/// Every threshold `t` between neighbours `lo < hi` satisfies
/// `lo <= t < hi`, so it always separates them.
#[must_use]
pub fn candidate_thresholds(column: &[f64], max_thresholds: Option<usize>) -> Vec<f64> {
    let mut sorted = column.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut distinct = sorted.clone();
    distinct.dedup();
    let midpoints: Vec<f64> = distinct
        .windows(2)
        .map(|w| midpoint(w[0], w[1]))
        .collect();

    let Some(limit) = max_thresholds else {
        return midpoints;
    };
    if limit >= midpoints.len() {
        return midpoints;
    }

    let n = sorted.len();
    let mut chosen: Vec<f64> = Vec::with_capacity(limit);
    for j in 1..=limit {
        let value = sorted[(j * n / (limit + 1)).min(n - 1)];
        let k = midpoints.partition_point(|&m| m < value);
        if let Some(&m) = midpoints.get(k) {
            if chosen.last() != Some(&m) {
                chosen.push(m);
            }
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor() -> (Vec<Vec<f64>>, Vec<Label>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for rep in 0..5_i32 {
            for (a, b) in [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)] {
                x.push(vec![a, b, f64::from(rep)]);
                y.push(i64::from((a > 0.5) != (b > 0.5)));
            }
        }
        (x, y)
    }

    #[test]
    fn test_optimal_solves_xor_at_depth_two() {
        let (x, y) = xor();
        let mut model = OptimalTree::exact(2);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.training_errors(), Some(0));
        assert_eq!(model.predict(&x).unwrap(), y);
        assert!(model.tree().unwrap().depth() <= 2);
    }

    #[test]
    fn test_optimal_depth_one_is_best_stump() {
        // Only feature 1 separates cleanly except one sample.
        let x = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.1],
            vec![0.0, 0.2],
            vec![1.0, 0.9],
            vec![0.0, 1.0],
            vec![1.0, 1.1],
        ];
        let y = vec![0, 0, 0, 1, 0, 1];
        let mut model = OptimalTree::exact(1);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.training_errors(), Some(1));
    }

    #[test]
    fn test_optimal_pure_node_is_leaf() {
        let mut model = OptimalTree::exact(3);
        model.fit(&[vec![1.0], vec![2.0]], &[7, 7]).unwrap();
        assert_eq!(model.tree().unwrap().leaf_count(), 1);
    }

    #[test]
    fn test_optimal_rejects_zero_depth() {
        let mut model = OptimalTree::exact(0);
        assert!(matches!(
            model.fit(&[vec![1.0]], &[1]).unwrap_err(),
            Error::InvalidDepth(0)
        ));
    }

    #[test]
    fn test_candidate_thresholds_exact() {
        let t = candidate_thresholds(&[3.0, 1.0, 2.0, 2.0], None);
        assert_eq!(t, vec![1.5, 2.5]);
    }

    #[test]
    fn test_adjacent_floats_stay_separable() {
        let lo = f64::from_bits(1.0_f64.to_bits() + 1);
        let hi = f64::from_bits(lo.to_bits() + 1);
        let t = candidate_thresholds(&[hi, lo], None);
        assert_eq!(t.len(), 1);
        assert!(lo <= t[0] && t[0] < hi);

        let x = vec![vec![lo], vec![hi], vec![lo], vec![hi]];
        let y = vec![0, 1, 0, 1];
        let mut model = OptimalTree::exact(1);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.training_errors(), Some(0));
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_candidate_thresholds_limited() {
        let column: Vec<f64> = (0..100_i32).map(f64::from).collect();
        let t = candidate_thresholds(&column, Some(10));
        assert!(t.len() <= 10);
        assert!(!t.is_empty());
        assert!(t.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_binned_factory_applies_threshold_count() {
        let factory = BinnedFactory::new(3);
        let model = factory.build(&TreeParams::with_depth(2));
        assert_eq!(model.method(), OPTIMAL_BINNED);
    }

    #[cfg(feature = "binned")]
    #[test]
    fn test_binned_available() {
        assert_eq!(BinnedFactory::default().availability(), Availability::Available);
    }
}
