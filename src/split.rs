//! Seeded train/test splits
//!
//! Two methods are only comparable if they see the same partition, so the
//! split is a pure function of `(n_samples, test_fraction, seed)`:
//!
//! 1. indices `0..n` are shuffled with a Fisher-Yates shuffle driven by
//!    `ChaCha8Rng::seed_from_u64(seed)` (the `rand` 0.8 `SliceRandom`
//!    algorithm),
//! 2. the first `ceil(test_fraction * n)` shuffled indices form the test
//!    set, the remainder the training set.
//!
//! Any reimplementation that reuses these splits for comparison must keep
//! both the generator and the seeding convention. Splits are not stratified.

use crate::dataset::{Dataset, Subset};
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Seed used for a repetition: `base_seed + repetition`.
///
/// Every method in the same repetition gets the same seed, hence the same
/// split.
#[must_use]
pub const fn repetition_seed(base_seed: u64, repetition: u32) -> u64 {
    base_seed.wrapping_add(repetition as u64)
}

/// Disjoint, exhaustive partition of sample indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    seed: u64,
    train_indices: Vec<usize>,
    test_indices: Vec<usize>,
}

impl Split {
    /// Seed the split was drawn with
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Training sample indices, in shuffled order
    #[must_use]
    pub fn train_indices(&self) -> &[usize] {
        &self.train_indices
    }

    /// Test sample indices, in shuffled order
    #[must_use]
    pub fn test_indices(&self) -> &[usize] {
        &self.test_indices
    }

    /// Materialize the training rows of `dataset`
    #[must_use]
    pub fn train(&self, dataset: &Dataset) -> Subset {
        dataset.subset(&self.train_indices)
    }

    /// Materialize the test rows of `dataset`
    #[must_use]
    pub fn test(&self, dataset: &Dataset) -> Subset {
        dataset.subset(&self.test_indices)
    }
}

/// Produces [`Split`]s with a fixed test fraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitGenerator {
    test_fraction: f64,
}

impl SplitGenerator {
    /// Generator holding out `test_fraction` of the samples.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless `0 < test_fraction < 1`.
    pub fn new(test_fraction: f64) -> Result<Self> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(Error::InvalidInput(format!(
                "test fraction must be in (0, 1), got {test_fraction}"
            )));
        }
        Ok(Self { test_fraction })
    }

    /// Configured test fraction
    #[must_use]
    pub const fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Number of test samples for a dataset of `n_samples` rows
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn test_size(&self, n_samples: usize) -> usize {
        (self.test_fraction * n_samples as f64).ceil() as usize
    }

    /// Partition `0..n_samples` using `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either side of the split would be
    /// empty.
    pub fn split(&self, n_samples: usize, seed: u64) -> Result<Split> {
        let n_test = self.test_size(n_samples);
        if n_test == 0 || n_test >= n_samples {
            return Err(Error::InvalidInput(format!(
                "cannot split {n_samples} samples with test fraction {}",
                self.test_fraction
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let train_indices = indices.split_off(n_test);
        Ok(Split {
            seed,
            train_indices,
            test_indices: indices,
        })
    }

    /// Partition the rows of `dataset` using `seed`.
    ///
    /// # Errors
    ///
    /// See [`SplitGenerator::split`].
    pub fn split_dataset(&self, dataset: &Dataset, seed: u64) -> Result<Split> {
        self.split(dataset.n_samples(), seed)
    }
}
