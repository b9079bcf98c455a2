//! Trial executor
//!
//! Runs one fresh classifier on one split. Only `fit` is timed; the two
//! `predict` calls that produce the accuracies happen after the clock
//! stops.

use crate::classifier::{accuracy, Classifier};
use crate::dataset::Subset;
use crate::experiment::{TrialResult, TrialSpec};
use crate::Result;
use std::time::Instant;
use tracing::{debug, instrument};

/// Fit `classifier` on `train`, score it on `train` and `test`.
///
/// Errors from `fit` or `predict` are returned unchanged; the caller decides
/// whether a failed trial is fatal.
///
/// # Errors
///
/// Propagates any error raised by the classifier.
#[instrument(skip_all, fields(dataset = %spec.dataset, method = %spec.method, depth = spec.depth, run = spec.run))]
pub fn execute_trial(
    spec: &TrialSpec,
    classifier: &mut dyn Classifier,
    train: &Subset,
    test: &Subset,
) -> Result<TrialResult> {
    let start = Instant::now();
    classifier.fit(&train.features, &train.labels)?;
    let runtime = start.elapsed().as_secs_f64();

    let train_accuracy = accuracy(&train.labels, &classifier.predict(&train.features)?)?;
    let test_accuracy = accuracy(&test.labels, &classifier.predict(&test.features)?)?;

    debug!(runtime, train_accuracy, test_accuracy, "trial complete");
    Ok(TrialResult::new(spec, runtime, train_accuracy, test_accuracy))
}
