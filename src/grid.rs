//! Experiment grid runner
//!
//! Iterates `datasets × depths × runs × methods` strictly in that nesting
//! order, one trial at a time on the calling thread. Trials are never run
//! concurrently: the recorded fit times must not be perturbed by other
//! trials competing for the CPU.
//!
//! Failure isolation:
//! - a dataset that cannot be loaded or split is recorded in
//!   [`GridReport::dataset_failures`] and the grid moves on to the next
//!   dataset; all splits for a dataset are drawn before its first trial, so
//!   a dataset either contributes every trial or none;
//! - a trial whose fit or predict fails is recorded as a
//!   [`TrialFailure`] and the grid continues;
//! - unavailable methods were already removed by
//!   [`MethodRegistry::detect`](crate::classifier::MethodRegistry::detect)
//!   and are listed once in [`GridReport::skipped_methods`].

use crate::classifier::{MethodSelection, SkippedMethod, TreeParams};
use crate::dataset::{display_name, DatasetSource};
use crate::experiment::{timestamp_id, BenchmarkRecord, ResultTable, TrialFailure, TrialResult, TrialSpec};
use crate::split::{repetition_seed, Split, SplitGenerator};
use crate::trial::execute_trial;
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

/// Axes of the experiment grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Dataset names, outermost loop
    pub datasets: Vec<String>,
    /// Depth limits, second loop
    pub depths: Vec<usize>,
    /// Number of repetitions (random splits) per dataset and depth
    pub repetitions: u32,
    /// Index of the first repetition
    pub first_run: u32,
    /// Split seed of run `r` is `base_seed + r`
    pub base_seed: u64,
    /// Fraction of samples held out for testing
    pub test_fraction: f64,
    /// Forwarded to every classifier
    pub verbose: bool,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            datasets: vec!["bank".to_string(), "wilt".to_string(), "bidding".to_string()],
            depths: (2..=4).collect(),
            repetitions: 10,
            first_run: 1,
            base_seed: 42,
            test_fraction: 0.2,
            verbose: false,
        }
    }
}

impl GridSpec {
    /// Check the grid axes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty axis, a run range past
    /// `u32::MAX` or a bad test fraction.
    pub fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            return Err(Error::InvalidInput("no datasets configured".to_string()));
        }
        if self.depths.is_empty() {
            return Err(Error::InvalidInput("no depths configured".to_string()));
        }
        if self.repetitions == 0 {
            return Err(Error::InvalidInput("repetitions must be at least 1".to_string()));
        }
        if self.first_run.checked_add(self.repetitions).is_none() {
            return Err(Error::InvalidInput(format!(
                "runs {}.. with {} repetitions overflow u32",
                self.first_run, self.repetitions
            )));
        }
        SplitGenerator::new(self.test_fraction).map(|_| ())
    }

    /// Repetition indices, in execution order; capped at `u32::MAX` for a
    /// spec that would not validate
    pub fn runs(&self) -> impl Iterator<Item = u32> {
        self.first_run..self.first_run.saturating_add(self.repetitions)
    }

    /// Total number of trials for `n_methods` methods
    #[must_use]
    pub fn trial_count(&self, n_methods: usize) -> usize {
        self.datasets.len() * self.depths.len() * self.repetitions as usize * n_methods
    }
}

/// A dataset whose portion of the grid was abandoned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFailure {
    /// Dataset name as configured
    pub dataset: String,
    /// Error message
    pub reason: String,
}

/// Per-trial notification passed to progress callbacks
#[derive(Debug, Clone, Copy)]
pub enum TrialEvent<'a> {
    /// The trial finished and was appended to the table
    Completed(&'a TrialResult),
    /// The trial failed and was recorded as such
    Failed(&'a TrialFailure),
}

impl TrialEvent<'_> {
    /// Human-readable progress line
    #[must_use]
    pub fn progress_line(&self) -> String {
        match self {
            Self::Completed(result) => result.progress_line(),
            Self::Failed(failure) => failure.progress_line(),
        }
    }
}

/// Everything one grid run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridReport {
    /// Run metadata and configuration snapshot
    pub record: BenchmarkRecord,
    /// Completed trials (and failed-trial markers)
    pub table: ResultTable,
    /// Datasets that could not be loaded or split
    pub dataset_failures: Vec<DatasetFailure>,
    /// Methods skipped for the whole run
    pub skipped_methods: Vec<SkippedMethod>,
}

/// Drives the grid over a dataset source and a fixed method list
pub struct GridRunner<'a, S: DatasetSource + ?Sized> {
    source: &'a S,
    methods: &'a MethodSelection,
    spec: GridSpec,
}

impl<'a, S: DatasetSource + ?Sized> GridRunner<'a, S> {
    /// Runner over `source` with the detected `methods`
    #[must_use]
    pub const fn new(source: &'a S, methods: &'a MethodSelection, spec: GridSpec) -> Self {
        Self {
            source,
            methods,
            spec,
        }
    }

    /// Grid axes
    #[must_use]
    pub const fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Run the whole grid without progress output.
    ///
    /// # Errors
    ///
    /// See [`GridRunner::run_with`].
    pub fn run(&self) -> Result<GridReport> {
        self.run_with(|_| {})
    }

    /// Run the whole grid, calling `on_trial` after every trial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the grid spec is invalid. Dataset
    /// and trial failures are recorded in the report, not returned.
    #[instrument(skip_all, fields(datasets = self.spec.datasets.len(), depths = self.spec.depths.len(), runs = self.spec.repetitions))]
    pub fn run_with(&self, mut on_trial: impl FnMut(TrialEvent<'_>)) -> Result<GridReport> {
        self.spec.validate()?;
        let splitter = SplitGenerator::new(self.spec.test_fraction)?;

        let created = Utc::now();
        let record = BenchmarkRecord::builder(timestamp_id("bench", created), "depth-limited tree benchmark")
            .config(serde_json::json!({
                "grid": &self.spec,
                "methods": self.methods.methods(),
            }))
            .created_at(created)
            .build();

        info!(
            trials = self.spec.trial_count(self.methods.factories().len()),
            methods = ?self.methods.methods(),
            skipped = self.methods.skipped().len(),
            "starting benchmark grid"
        );

        let mut table = ResultTable::new();
        let mut dataset_failures = Vec::new();

        for name in &self.spec.datasets {
            if let Err(e) = self.run_dataset(name, &splitter, &mut table, &mut on_trial) {
                error!(dataset = %name, error = %e, "dataset abandoned");
                dataset_failures.push(DatasetFailure {
                    dataset: name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        info!(
            completed = table.len(),
            failed_trials = table.failures().len(),
            failed_datasets = dataset_failures.len(),
            "benchmark grid finished"
        );

        Ok(GridReport {
            record,
            table,
            dataset_failures,
            skipped_methods: self.methods.skipped().to_vec(),
        })
    }

    /// Load one dataset, draw its splits, then run every trial for it.
    ///
    /// Only loading and splitting can fail here; both happen before any
    /// trial for this dataset is appended.
    fn run_dataset(
        &self,
        name: &str,
        splitter: &SplitGenerator,
        table: &mut ResultTable,
        on_trial: &mut impl FnMut(TrialEvent<'_>),
    ) -> Result<()> {
        let dataset = self.source.load(name)?;
        let splits: Vec<(u32, Split)> = self
            .spec
            .runs()
            .map(|run| {
                splitter
                    .split_dataset(&dataset, repetition_seed(self.spec.base_seed, run))
                    .map(|split| (run, split))
            })
            .collect::<Result<_>>()?;
        let subsets: Vec<_> = splits
            .iter()
            .map(|(run, split)| (*run, split.train(&dataset), split.test(&dataset)))
            .collect();
        let label = display_name(name);

        for &depth in &self.spec.depths {
            for (run, train, test) in &subsets {
                for factory in self.methods.factories() {
                    let spec = TrialSpec {
                        dataset: label.clone(),
                        method: factory.method().to_string(),
                        depth,
                        run: *run,
                    };
                    let params = TreeParams {
                        verbose: self.spec.verbose,
                        ..TreeParams::with_depth(depth)
                    };
                    let mut classifier = factory.build(&params);

                    match execute_trial(&spec, classifier.as_mut(), train, test) {
                        Ok(result) => {
                            on_trial(TrialEvent::Completed(&result));
                            table.push(result);
                        }
                        Err(e) => {
                            warn!(method = %spec.method, depth, run, error = %e, "trial failed");
                            let failure = TrialFailure::new(spec, e.to_string());
                            on_trial(TrialEvent::Failed(&failure));
                            table.push_failure(failure);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
