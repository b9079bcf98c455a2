//! Hyper-parameter search
//!
//! Exhaustive search over a [`ParamGrid`] scored by shuffled k-fold
//! cross-validation. The winning parameters are refit on all of the
//! training data.
//!
//! ```rust
//! use treebench::classifier::GreedyFactory;
//! use treebench::search::{GridSearch, ParamGrid};
//!
//! let features: Vec<Vec<f64>> = (0..20_i32).map(|i| vec![f64::from(i)]).collect();
//! let labels: Vec<i64> = (0..20).map(|i| i64::from(i >= 10)).collect();
//!
//! let grid = ParamGrid::new().max_depth(vec![1, 2]);
//! let fitted = GridSearch::new(&GreedyFactory, grid).folds(4).fit(&features, &labels)?;
//! assert_eq!(fitted.best_params().max_depth, 1);
//! # Ok::<(), treebench::Error>(())
//! ```

use crate::classifier::{accuracy, Classifier, ClassifierFactory, TreeParams};
use crate::dataset::Label;
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Default number of cross-validation folds
pub const DEFAULT_FOLDS: usize = 5;

/// Candidate values per tunable parameter.
///
/// An empty list means "use the base parameters' value".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamGrid {
    max_depth: Vec<usize>,
    max_thresholds: Vec<Option<usize>>,
}

impl ParamGrid {
    /// Empty grid (a single candidate: the base parameters)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate depth limits
    #[must_use]
    pub fn max_depth(mut self, values: Vec<usize>) -> Self {
        self.max_depth = values;
        self
    }

    /// Candidate threshold limits (`None` = every midpoint)
    #[must_use]
    pub fn max_thresholds(mut self, values: Vec<Option<usize>>) -> Self {
        self.max_thresholds = values;
        self
    }

    /// Parse a JSON object such as `{"max_depth": [2, 3], "max_thresholds": [null, 10]}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown keys, non-list values or
    /// values that are not non-negative integers.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidInput("parameter grid must be a JSON object".to_string()))?;

        let mut grid = Self::new();
        for (key, values) in object {
            let values = values
                .as_array()
                .ok_or_else(|| Error::InvalidInput(format!("parameter '{key}' must map to a list")))?;
            match key.as_str() {
                "max_depth" => {
                    grid.max_depth = values
                        .iter()
                        .map(|v| as_usize(key, v))
                        .collect::<Result<_>>()?;
                }
                "max_thresholds" => {
                    grid.max_thresholds = values
                        .iter()
                        .map(|v| if v.is_null() { Ok(None) } else { as_usize(key, v).map(Some) })
                        .collect::<Result<_>>()?;
                }
                other => {
                    return Err(Error::InvalidInput(format!(
                        "unknown parameter '{other}' (expected max_depth or max_thresholds)"
                    )))
                }
            }
        }
        Ok(grid)
    }

    /// Every combination in grid order: depth outer, thresholds inner
    #[must_use]
    pub fn candidates(&self, base: TreeParams) -> Vec<TreeParams> {
        let depths = if self.max_depth.is_empty() {
            vec![base.max_depth]
        } else {
            self.max_depth.clone()
        };
        let thresholds = if self.max_thresholds.is_empty() {
            vec![base.max_thresholds]
        } else {
            self.max_thresholds.clone()
        };

        depths
            .iter()
            .flat_map(|&max_depth| {
                thresholds.iter().map(move |&max_thresholds| TreeParams {
                    max_depth,
                    max_thresholds,
                    ..base
                })
            })
            .collect()
    }
}

fn as_usize(key: &str, value: &serde_json::Value) -> Result<usize> {
    value
        .as_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| Error::InvalidInput(format!("parameter '{key}' expects integers, got {value}")))
}

/// Cross-validation score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scoring {
    /// Percentage of correct predictions
    #[default]
    Accuracy,
}

impl Scoring {
    /// Score predictions against the truth (higher is better).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the lengths differ.
    pub fn score(self, truth: &[Label], predicted: &[Label]) -> Result<f64> {
        match self {
            Self::Accuracy => accuracy(truth, predicted),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accuracy => f.write_str("accuracy"),
        }
    }
}

impl FromStr for Scoring {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Self::Accuracy),
            other => Err(Error::InvalidInput(format!("unknown scoring '{other}'"))),
        }
    }
}

/// Mean cross-validation score of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Candidate parameters
    pub params: TreeParams,
    /// Score on each held-out fold
    pub fold_scores: Vec<f64>,
    /// Mean over folds
    pub mean_score: f64,
}

/// Exhaustive k-fold search for one method
pub struct GridSearch<'a> {
    factory: &'a dyn ClassifierFactory,
    grid: ParamGrid,
    base: TreeParams,
    folds: usize,
    seed: u64,
    scoring: Scoring,
}

impl<'a> GridSearch<'a> {
    /// Search `grid` for the method built by `factory`
    #[must_use]
    pub fn new(factory: &'a dyn ClassifierFactory, grid: ParamGrid) -> Self {
        Self {
            factory,
            grid,
            base: TreeParams::default(),
            folds: DEFAULT_FOLDS,
            seed: 0,
            scoring: Scoring::Accuracy,
        }
    }

    /// Values used for parameters the grid leaves empty
    #[must_use]
    pub const fn base_params(mut self, base: TreeParams) -> Self {
        self.base = base;
        self
    }

    /// Number of folds
    #[must_use]
    pub const fn folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    /// Seed of the fold shuffle
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Scoring function
    #[must_use]
    pub const fn scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// Held-out index sets of the k folds; sizes differ by at most one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `folds < 2` or there are fewer
    /// samples than folds.
    pub fn fold_indices(&self, n_samples: usize) -> Result<Vec<Vec<usize>>> {
        if self.folds < 2 {
            return Err(Error::InvalidInput(format!(
                "at least 2 folds required, got {}",
                self.folds
            )));
        }
        if n_samples < self.folds {
            return Err(Error::InvalidInput(format!(
                "{n_samples} samples cannot fill {} folds",
                self.folds
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));

        let base = n_samples / self.folds;
        let remainder = n_samples % self.folds;
        let mut folds = Vec::with_capacity(self.folds);
        let mut start = 0;
        for k in 0..self.folds {
            let size = if k < remainder { base + 1 } else { base };
            folds.push(indices[start..start + size].to_vec());
            start += size;
        }
        Ok(folds)
    }

    /// Score every candidate, then refit the best on all rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a bad fold count or an empty
    /// grid, and propagates any fit or predict error.
    #[instrument(skip_all, fields(method = self.factory.method(), folds = self.folds))]
    pub fn fit(&self, features: &[Vec<f64>], labels: &[Label]) -> Result<FittedSearch> {
        if features.len() != labels.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let folds = self.fold_indices(features.len())?;
        let candidates = self.grid.candidates(self.base);

        let mut scores = Vec::with_capacity(candidates.len());
        for params in candidates {
            let mut fold_scores = Vec::with_capacity(folds.len());
            for (k, held_out) in folds.iter().enumerate() {
                let train: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != k)
                    .flat_map(|(_, fold)| fold.iter().copied())
                    .collect();
                let mut model = self.factory.build(&params);
                model.fit(&rows(features, &train), &rows(labels, &train))?;
                let predicted = model.predict(&rows(features, held_out))?;
                fold_scores.push(self.scoring.score(&rows(labels, held_out), &predicted)?);
            }
            #[allow(clippy::cast_precision_loss)]
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            debug!(depth = params.max_depth, thresholds = ?params.max_thresholds, mean_score, "candidate scored");
            scores.push(CandidateScore {
                params,
                fold_scores,
                mean_score,
            });
        }

        // strict comparison keeps the earliest candidate on ties
        let best = scores
            .iter()
            .reduce(|best, c| if c.mean_score > best.mean_score { c } else { best })
            .ok_or_else(|| Error::InvalidInput("parameter grid has no candidates".to_string()))?;
        let best_params = best.params;
        let best_score = best.mean_score;

        let mut model = self.factory.build(&best_params);
        model.fit(features, labels)?;
        info!(depth = best_params.max_depth, thresholds = ?best_params.max_thresholds, best_score, "grid search finished");

        Ok(FittedSearch {
            best_params,
            best_score,
            scoring: self.scoring,
            candidates: scores,
            model,
        })
    }
}

fn rows<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

/// Search outcome with the refit model
pub struct FittedSearch {
    best_params: TreeParams,
    best_score: f64,
    scoring: Scoring,
    candidates: Vec<CandidateScore>,
    model: Box<dyn Classifier>,
}

impl std::fmt::Debug for FittedSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FittedSearch")
            .field("best_params", &self.best_params)
            .field("best_score", &self.best_score)
            .field("scoring", &self.scoring)
            .field("candidates", &self.candidates)
            .finish_non_exhaustive()
    }
}

impl FittedSearch {
    /// Winning parameters
    #[must_use]
    pub const fn best_params(&self) -> TreeParams {
        self.best_params
    }

    /// Mean CV score of the winner
    #[must_use]
    pub const fn best_score(&self) -> f64 {
        self.best_score
    }

    /// Every candidate in grid order
    #[must_use]
    pub fn candidates(&self) -> &[CandidateScore] {
        &self.candidates
    }

    /// The refit model
    #[must_use]
    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    /// Predict with the refit model.
    ///
    /// # Errors
    ///
    /// Propagates the model's predict error.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>> {
        self.model.predict(features)
    }

    /// Score the refit model on held-out data.
    ///
    /// # Errors
    ///
    /// Propagates predict errors and length mismatches.
    pub fn score(&self, features: &[Vec<f64>], labels: &[Label]) -> Result<f64> {
        self.scoring.score(labels, &self.predict(features)?)
    }
}
