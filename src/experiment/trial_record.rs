//! Trial Record - one measured (dataset, method, depth, run) combination

use serde::{Deserialize, Serialize};

/// Identifies one trial in the experiment grid.
///
/// The run index maps to the split seed (`base_seed + run`), so every
/// method with the same `(dataset, run)` is trained and tested on the same
/// samples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialSpec {
    /// Dataset display name
    pub dataset: String,
    /// Method name
    pub method: String,
    /// Depth limit
    pub depth: usize,
    /// Repetition index
    pub run: u32,
}

/// Measurements of one completed trial (one wide-form row).
///
/// Field names serialize to the column names of the wide result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    #[serde(rename = "Method")]
    method: String,
    #[serde(rename = "Dataset")]
    dataset: String,
    #[serde(rename = "Run")]
    run: u32,
    #[serde(rename = "Depth")]
    depth: usize,
    #[serde(rename = "Runtime")]
    runtime: f64,
    #[serde(rename = "Train Accuracy")]
    train_accuracy: f64,
    #[serde(rename = "Test Accuracy")]
    test_accuracy: f64,
}

impl TrialResult {
    /// Create a trial result.
    ///
    /// # Arguments
    ///
    /// * `spec` - The trial that was executed
    /// * `runtime` - Fit duration in seconds
    /// * `train_accuracy` - Training accuracy in percent
    /// * `test_accuracy` - Test accuracy in percent
    #[must_use]
    pub fn new(spec: &TrialSpec, runtime: f64, train_accuracy: f64, test_accuracy: f64) -> Self {
        Self {
            method: spec.method.clone(),
            dataset: spec.dataset.clone(),
            run: spec.run,
            depth: spec.depth,
            runtime,
            train_accuracy,
            test_accuracy,
        }
    }

    /// Get the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get the dataset display name.
    #[must_use]
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Get the repetition index.
    #[must_use]
    pub const fn run(&self) -> u32 {
        self.run
    }

    /// Get the depth limit.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Get the fit duration in seconds.
    #[must_use]
    pub const fn runtime(&self) -> f64 {
        self.runtime
    }

    /// Get the training accuracy in percent.
    #[must_use]
    pub const fn train_accuracy(&self) -> f64 {
        self.train_accuracy
    }

    /// Get the test accuracy in percent.
    #[must_use]
    pub const fn test_accuracy(&self) -> f64 {
        self.test_accuracy
    }

    /// The identifying columns of this row.
    #[must_use]
    pub fn spec(&self) -> TrialSpec {
        TrialSpec {
            dataset: self.dataset.clone(),
            method: self.method.clone(),
            depth: self.depth,
            run: self.run,
        }
    }

    /// Fixed-width progress line printed while the grid runs.
    #[must_use]
    pub fn progress_line(&self) -> String {
        format!(
            "{:10} |  Run {:2} | {:9} d={}  |  run time: {:6.3}  | train accuracy: {:4.2} | test accuracy: {:4.2}",
            self.dataset,
            self.run,
            self.method,
            self.depth,
            self.runtime,
            self.train_accuracy,
            self.test_accuracy
        )
    }
}

/// A trial whose fit or predict step failed.
///
/// Failures are recorded next to the result table instead of aborting the
/// grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialFailure {
    spec: TrialSpec,
    reason: String,
}

impl TrialFailure {
    /// Create a failure marker.
    #[must_use]
    pub fn new(spec: TrialSpec, reason: impl Into<String>) -> Self {
        Self {
            spec,
            reason: reason.into(),
        }
    }

    /// Get the failed trial.
    #[must_use]
    pub const fn spec(&self) -> &TrialSpec {
        &self.spec
    }

    /// Get the failure description.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Progress line printed in place of the trial's measurements.
    #[must_use]
    pub fn progress_line(&self) -> String {
        format!(
            "{:10} |  Run {:2} | {:9} d={}  |  FAILED: {}",
            self.spec.dataset, self.spec.run, self.spec.method, self.spec.depth, self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TrialSpec {
        TrialSpec {
            dataset: "Bank".to_string(),
            method: "CART".to_string(),
            depth: 3,
            run: 7,
        }
    }

    #[test]
    fn test_trial_result_new() {
        let result = TrialResult::new(&spec(), 0.25, 91.5, 88.0);
        assert_eq!(result.method(), "CART");
        assert_eq!(result.dataset(), "Bank");
        assert_eq!(result.run(), 7);
        assert_eq!(result.depth(), 3);
        assert_eq!(result.spec(), spec());
    }

    #[test]
    fn test_progress_line_layout() {
        let line = TrialResult::new(&spec(), 0.25, 91.5, 88.0).progress_line();
        assert_eq!(
            line,
            "Bank       |  Run  7 | CART      d=3  |  run time:  0.250  | train accuracy: 91.50 | test accuracy: 88.00"
        );
    }

    #[test]
    fn test_serialized_column_names() {
        let json = serde_json::to_value(TrialResult::new(&spec(), 0.1, 1.0, 2.0)).unwrap();
        assert!(json.get("Train Accuracy").is_some());
        assert!(json.get("Runtime").is_some());
    }

    #[test]
    fn test_failure_line() {
        let failure = TrialFailure::new(spec(), "single class");
        assert!(failure.progress_line().contains("FAILED: single class"));
    }
}
