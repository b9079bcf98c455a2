//! Labeled tabular datasets
//!
//! A [`Dataset`] is immutable once constructed: the feature matrix is
//! row-major (`features[sample][feature]`) and holds exactly one label per
//! row. Subsets produced by a split are owned copies, so trials never share
//! mutable data.

mod loader;

pub use loader::{parse_dataset, DatasetSource, DirectorySource, InMemorySource};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Integer class label (column 0 of a dataset file)
pub type Label = i64;

/// Named feature matrix plus label vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    name: String,
    features: Vec<Vec<f64>>,
    labels: Vec<Label>,
}

impl Dataset {
    /// Create a dataset, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the row counts differ, if any row
    /// has a different width than the first, or if the dataset is empty.
    pub fn new(
        name: impl Into<String>,
        features: Vec<Vec<f64>>,
        labels: Vec<Label>,
    ) -> Result<Self> {
        let name = name.into();
        if features.len() != labels.len() {
            return Err(Error::ShapeMismatch(format!(
                "{name}: {} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if features.is_empty() {
            return Err(Error::ShapeMismatch(format!("{name}: dataset has no samples")));
        }
        let width = features[0].len();
        if let Some((row, bad)) = features.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::ShapeMismatch(format!(
                "{name}: row {row} has {} features, expected {width}",
                bad.len()
            )));
        }
        Ok(Self {
            name,
            features,
            labels,
        })
    }

    /// Dataset name as requested from the source (e.g. `bank`)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with the first letter upper-cased, used in reports (e.g. `Bank`)
    #[must_use]
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }

    /// Row-major feature matrix
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Label vector
    #[must_use]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Number of samples
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Number of feature columns
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Per-class sample counts, ordered by label
    #[must_use]
    pub fn class_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Fraction of samples belonging to the most frequent class
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn majority_fraction(&self) -> f64 {
        let max = self.class_counts().values().copied().max().unwrap_or(0);
        max as f64 / self.n_samples() as f64
    }

    /// Copy out the rows at `indices`, in the given order.
    ///
    /// Indices must be in range; callers obtain them from a split of this
    /// dataset.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Subset {
        Subset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Owned slice of a dataset handed to a classifier
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subset {
    /// Row-major features
    pub features: Vec<Vec<f64>>,
    /// One label per row
    pub labels: Vec<Label>,
}

impl Subset {
    /// Number of samples in the subset
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the subset has no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Capitalize a dataset name for display (`wilt` -> `Wilt`).
#[must_use]
pub fn display_name(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}
