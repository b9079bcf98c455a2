//! Classifier adapters
//!
//! The harness never knows which tree-induction method it is driving. Each
//! method implements [`Classifier`] (`fit` / `predict`) and is constructed
//! per trial by a [`ClassifierFactory`], so fitted state can never leak
//! from one trial into the next.
//!
//! Optional methods are resolved once, before any trial runs, by
//! [`MethodRegistry::detect`]:
//!
//! ```rust
//! use treebench::classifier::MethodRegistry;
//!
//! let selection = MethodRegistry::builtin().detect(None)?;
//! assert!(selection.methods().contains(&"CART"));
//! # Ok::<(), treebench::Error>(())
//! ```

mod greedy;
mod optimal;
mod solver;
mod tree;

pub use greedy::{GreedyFactory, GreedyTree};
pub use optimal::{
    candidate_thresholds, BinnedFactory, OptimalFactory, OptimalTree, DEFAULT_BINNED_THRESHOLDS,
};
pub use tree::{DecisionTree, Dot, Node};

use crate::dataset::Label;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Method name of the exhaustive depth-bounded tree
pub const OPTIMAL: &str = "Optimal";
/// Method name of the greedy Gini tree
pub const CART: &str = "CART";
/// Method name of the quantile-threshold optimal tree
pub const OPTIMAL_BINNED: &str = "Optimal-Binned";

/// A tree-induction method behind the uniform fit/predict contract
pub trait Classifier {
    /// Method name recorded in results
    fn method(&self) -> &str;

    /// Train on row-major `features` and one label per row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDepth`] for a zero depth limit and
    /// [`Error::FitFailed`] for malformed or degenerate input.
    fn fit(&mut self, features: &[Vec<f64>], labels: &[Label]) -> Result<()>;

    /// Predict one label per row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFitted`] before a successful `fit`, and
    /// [`Error::InvalidInput`] if the feature width differs from training.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>>;
}

/// Construction parameters shared by every tree method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum number of decision levels
    pub max_depth: usize,
    /// Candidate thresholds per feature (`None` = every midpoint)
    pub max_thresholds: Option<usize>,
    /// Log search progress at `info` instead of `debug`
    pub verbose: bool,
}

impl TreeParams {
    /// Parameters with the given depth limit and defaults otherwise
    #[must_use]
    pub const fn with_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            max_thresholds: None,
            verbose: false,
        }
    }
}

impl Default for TreeParams {
    fn default() -> Self {
        Self::with_depth(3)
    }
}

/// Whether a method can run in this build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Method can be constructed
    Available,
    /// Method is missing, with the reason
    Unavailable(String),
}

/// Builds fresh, unfitted classifiers for one method
pub trait ClassifierFactory {
    /// Method name, unique within a registry
    fn method(&self) -> &str;

    /// Capability check, consulted once before the grid runs
    fn availability(&self) -> Availability {
        Availability::Available
    }

    /// Construct a new unfitted classifier
    fn build(&self, params: &TreeParams) -> Box<dyn Classifier>;
}

/// A method that was requested but cannot run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMethod {
    /// Method name
    pub method: String,
    /// Reason reported by the factory
    pub reason: String,
}

/// Ordered set of known methods
#[derive(Default)]
pub struct MethodRegistry {
    factories: Vec<Box<dyn ClassifierFactory>>,
}

impl MethodRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The methods shipped with the crate, in reporting order
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with(OptimalFactory)
            .with(GreedyFactory)
            .with(BinnedFactory::default())
    }

    /// Append a factory
    #[must_use]
    pub fn with(mut self, factory: impl ClassifierFactory + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    /// Registered method names, available or not
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.method()).collect()
    }

    /// Resolve which methods will run.
    ///
    /// With `requested = None` every registered method is considered;
    /// otherwise only the named ones, in registry order. Unavailable
    /// methods are reported once here and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a requested name is not
    /// registered, or if no method remains available.
    pub fn detect(self, requested: Option<&[String]>) -> Result<MethodSelection> {
        if let Some(requested) = requested {
            let known = self.names();
            if let Some(unknown) = requested.iter().find(|r| !known.contains(&r.as_str())) {
                return Err(Error::InvalidInput(format!(
                    "unknown method '{unknown}' (known: {})",
                    known.join(", ")
                )));
            }
        }

        let mut available = Vec::new();
        let mut skipped = Vec::new();
        for factory in self.factories {
            if requested.is_some_and(|r| !r.iter().any(|name| name == factory.method())) {
                continue;
            }
            match factory.availability() {
                Availability::Available => available.push(factory),
                Availability::Unavailable(reason) => {
                    warn!(method = factory.method(), %reason, "method unavailable, skipping for this run");
                    skipped.push(SkippedMethod {
                        method: factory.method().to_string(),
                        reason,
                    });
                }
            }
        }

        if available.is_empty() {
            return Err(Error::InvalidInput(
                "no classifier method is available".to_string(),
            ));
        }
        Ok(MethodSelection { available, skipped })
    }
}

/// Outcome of capability detection: the static method list for a run
pub struct MethodSelection {
    available: Vec<Box<dyn ClassifierFactory>>,
    skipped: Vec<SkippedMethod>,
}

impl MethodSelection {
    /// Factories that will run, in order
    #[must_use]
    pub fn factories(&self) -> &[Box<dyn ClassifierFactory>] {
        &self.available
    }

    /// Names of methods that will run
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        self.available.iter().map(|f| f.method()).collect()
    }

    /// Methods dropped during detection
    #[must_use]
    pub fn skipped(&self) -> &[SkippedMethod] {
        &self.skipped
    }

    /// Look up an available factory by name
    #[must_use]
    pub fn get(&self, method: &str) -> Option<&dyn ClassifierFactory> {
        self.available
            .iter()
            .find(|f| f.method() == method)
            .map(AsRef::as_ref)
    }

    /// Like [`MethodSelection::get`], but explains a missing method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MethodUnavailable`] if the method was skipped during
    /// detection and [`Error::InvalidInput`] if it was never selected.
    pub fn require(&self, method: &str) -> Result<&dyn ClassifierFactory> {
        if let Some(factory) = self.get(method) {
            return Ok(factory);
        }
        match self.skipped.iter().find(|s| s.method == method) {
            Some(skipped) => Err(Error::MethodUnavailable {
                method: skipped.method.clone(),
                reason: skipped.reason.clone(),
            }),
            None => Err(Error::InvalidInput(format!("method '{method}' was not selected"))),
        }
    }
}

/// Percentage of exact label matches, in `[0, 100]`.
///
/// Empty inputs score 0.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the slices differ in length.
#[allow(clippy::cast_precision_loss)]
pub fn accuracy(truth: &[Label], predicted: &[Label]) -> Result<f64> {
    if truth.len() != predicted.len() {
        return Err(Error::InvalidInput(format!(
            "accuracy over {} labels and {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    if truth.is_empty() {
        return Ok(0.0);
    }
    let hits = truth.iter().zip(predicted).filter(|(a, b)| a == b).count();
    Ok(hits as f64 / truth.len() as f64 * 100.0)
}
