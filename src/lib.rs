//! # treebench: Depth-Bounded Decision Tree Benchmarks
//!
//! Runs several tree-induction methods over a grid of datasets, depth
//! limits and seeded train/test splits, records fit time and accuracy for
//! every trial, and reshapes the results into a faceted comparison chart.
//!
//! ## Pipeline
//!
//! ```text
//! DatasetSource ─> GridRunner ─> execute_trial (× N, fresh Classifier) ─> ResultTable
//!                                                                          │
//!                                     render_svg <─ FacetGrid <─ melt <────┘
//! ```
//!
//! ## Design Principles
//!
//! - **Fair comparison**: every method in a repetition sees the same split
//!   (seed `base_seed + run`), and only `fit` is timed
//! - **Sequential trials**: one trial at a time, so timings are not skewed
//!   by contention
//! - **Failure isolation**: a broken dataset or trial is recorded and the
//!   grid keeps going
//!
//! ## Example Usage
//!
//! ```rust
//! use treebench::classifier::MethodRegistry;
//! use treebench::dataset::{Dataset, InMemorySource};
//! use treebench::grid::{GridRunner, GridSpec};
//! use treebench::reshape::{melt, Metric};
//!
//! let features: Vec<Vec<f64>> = (0..40_i32).map(|i| vec![f64::from(i)]).collect();
//! let labels: Vec<i64> = (0..40).map(|i| i64::from(i % 10 >= 5)).collect();
//! let source = InMemorySource::new().with(Dataset::new("toy", features, labels)?);
//!
//! let methods = MethodRegistry::builtin().detect(None)?;
//! let spec = GridSpec {
//!     datasets: vec!["toy".to_string()],
//!     depths: vec![1, 2],
//!     repetitions: 2,
//!     ..GridSpec::default()
//! };
//! let report = GridRunner::new(&source, &methods, spec).run()?;
//! assert_eq!(report.table.len(), 2 * 2 * methods.factories().len());
//!
//! let long = melt(&report.table, &Metric::ALL)?;
//! assert_eq!(long.len(), 3 * report.table.len());
//! # Ok::<(), treebench::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod grid;
pub mod plot;
pub mod reshape;
pub mod search;
pub mod split;
pub mod storage;
pub mod trial;

pub use error::{Error, Result};
