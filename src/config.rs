//! Benchmark configuration
//!
//! A single JSON file describes a benchmark: where the data lives, which
//! datasets, depths and methods to run, how to split, and where to write
//! results. Missing files are created with the defaults, which reproduce
//! the reference benchmark (three datasets, depths 2 to 4, ten runs seeded
//! `42 + run`, 20% held out).

use crate::classifier::{
    BinnedFactory, GreedyFactory, MethodRegistry, OptimalFactory, DEFAULT_BINNED_THRESHOLDS,
};
use crate::grid::GridSpec;
use crate::plot::PlotConfig;
use crate::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a benchmark run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Directory holding `<name>.txt` dataset files
    pub data_dir: PathBuf,
    /// Dataset names
    pub datasets: Vec<String>,
    /// Smallest depth limit (inclusive)
    pub min_depth: usize,
    /// Largest depth limit (inclusive)
    pub max_depth: usize,
    /// Repetitions per dataset and depth
    pub repetitions: u32,
    /// Index of the first repetition
    pub first_run: u32,
    /// Split seed of run `r` is `base_seed + r`
    pub base_seed: u64,
    /// Fraction of samples held out
    pub test_fraction: f64,
    /// Methods to run (`None` = every registered method)
    pub methods: Option<Vec<String>>,
    /// Threshold count of the binned optimal method
    pub binned_thresholds: usize,
    /// Verbose classifier logging
    pub verbose: bool,
    /// Wide result table output (`.parquet` or `.json`)
    pub results_path: Option<PathBuf>,
    /// Long-form table output (`.parquet` or `.json`)
    pub long_results_path: Option<PathBuf>,
    /// SVG chart output
    pub chart_path: Option<PathBuf>,
    /// Chart layout and style
    pub plot: PlotConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        let grid = GridSpec::default();
        Self {
            data_dir: PathBuf::from("data"),
            datasets: grid.datasets,
            min_depth: 2,
            max_depth: 4,
            repetitions: grid.repetitions,
            first_run: grid.first_run,
            base_seed: grid.base_seed,
            test_fraction: grid.test_fraction,
            methods: None,
            binned_thresholds: DEFAULT_BINNED_THRESHOLDS,
            verbose: false,
            results_path: Some(PathBuf::from("results/results.parquet")),
            long_results_path: None,
            chart_path: Some(PathBuf::from("results/comparison.svg")),
            plot: PlotConfig::default(),
        }
    }
}

impl BenchmarkConfig {
    /// Read `path`, or write and return the defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns I/O or JSON errors from reading or writing the file.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        load_or_init(path, Self::default)
    }

    /// Grid axes derived from this config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an inverted depth range or any
    /// invalid grid axis.
    pub fn grid_spec(&self) -> Result<GridSpec> {
        if self.min_depth > self.max_depth {
            return Err(Error::InvalidInput(format!(
                "min_depth {} exceeds max_depth {}",
                self.min_depth, self.max_depth
            )));
        }
        let spec = GridSpec {
            datasets: self.datasets.clone(),
            depths: (self.min_depth..=self.max_depth).collect(),
            repetitions: self.repetitions,
            first_run: self.first_run,
            base_seed: self.base_seed,
            test_fraction: self.test_fraction,
            verbose: self.verbose,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Registry of the built-in methods with this config's tuning
    #[must_use]
    pub fn registry(&self) -> MethodRegistry {
        MethodRegistry::new()
            .with(OptimalFactory)
            .with(GreedyFactory)
            .with(BinnedFactory::new(self.binned_thresholds))
    }
}

/// Load a JSON configuration from disk, creating it with the provided initializer if missing.
///
/// # Errors
///
/// Returns [`Error::Io`] or [`Error::Json`] if the file cannot be read,
/// parsed or written.
pub fn load_or_init<T, F>(path: &Path, initializer: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let value = initializer();
        fs::write(path, serde_json::to_string_pretty(&value)?)?;
        info!(path = %path.display(), "wrote default configuration");
        Ok(value)
    }
}
