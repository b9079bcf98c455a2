//! Result Table - append-only, ordered collection of trial results
//!
//! Rows are kept in execution order. Nothing is ever removed or rewritten;
//! reshaping and summarizing produce new values and leave the table alone.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use super::{TrialFailure, TrialResult};
use crate::Result;

/// Wide-form result table.
///
/// ## Schema
///
/// | column | type |
/// |---|---|
/// | `Method` | Utf8 |
/// | `Dataset` | Utf8 |
/// | `Run` | UInt32 |
/// | `Depth` | UInt32 |
/// | `Runtime` | Float64 (seconds) |
/// | `Train Accuracy` | Float64 (percent) |
/// | `Test Accuracy` | Float64 (percent) |
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    results: Vec<TrialResult>,
    failures: Vec<TrialFailure>,
}

impl ResultTable {
    /// Create a new empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the table holds no completed trials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of completed trials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Append a completed trial.
    pub fn push(&mut self, result: TrialResult) {
        self.results.push(result);
    }

    /// Record a failed trial.
    pub fn push_failure(&mut self, failure: TrialFailure) {
        self.failures.push(failure);
    }

    /// Completed trials, in execution order.
    #[must_use]
    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    /// Failed trials, in execution order.
    #[must_use]
    pub fn failures(&self) -> &[TrialFailure] {
        &self.failures
    }

    /// Iterate over completed trials.
    pub fn iter(&self) -> std::slice::Iter<'_, TrialResult> {
        self.results.iter()
    }

    /// Completed trials for one dataset (display name).
    #[must_use]
    pub fn for_dataset(&self, dataset: &str) -> Vec<&TrialResult> {
        self.results
            .iter()
            .filter(|r| r.dataset() == dataset)
            .collect()
    }

    /// Arrow schema of [`ResultTable::to_record_batch`].
    #[must_use]
    pub fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("Method", DataType::Utf8, false),
            Field::new("Dataset", DataType::Utf8, false),
            Field::new("Run", DataType::UInt32, false),
            Field::new("Depth", DataType::UInt32, false),
            Field::new("Runtime", DataType::Float64, false),
            Field::new("Train Accuracy", DataType::Float64, false),
            Field::new("Test Accuracy", DataType::Float64, false),
        ]))
    }

    /// Convert the completed trials to a columnar batch.
    ///
    /// # Errors
    ///
    /// Returns an Arrow error if the batch cannot be assembled.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(self.results.iter().map(TrialResult::method))),
            Arc::new(StringArray::from_iter_values(self.results.iter().map(TrialResult::dataset))),
            Arc::new(UInt32Array::from_iter_values(self.results.iter().map(TrialResult::run))),
            Arc::new(UInt32Array::from_iter_values(
                self.results.iter().map(|r| r.depth() as u32),
            )),
            Arc::new(Float64Array::from_iter_values(self.results.iter().map(TrialResult::runtime))),
            Arc::new(Float64Array::from_iter_values(
                self.results.iter().map(TrialResult::train_accuracy),
            )),
            Arc::new(Float64Array::from_iter_values(
                self.results.iter().map(TrialResult::test_accuracy),
            )),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    /// Mean and standard deviation per `(dataset, method, depth)`.
    ///
    /// Groups appear in the order their first trial was recorded.
    #[must_use]
    pub fn summary(&self) -> Vec<SummaryRow> {
        let mut order: Vec<(String, String, usize)> = Vec::new();
        let mut groups: HashMap<(String, String, usize), Vec<&TrialResult>> = HashMap::new();

        for result in &self.results {
            let key = (
                result.dataset().to_string(),
                result.method().to_string(),
                result.depth(),
            );
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(result);
        }

        order
            .into_iter()
            .map(|key| {
                let rows = &groups[&key];
                let (dataset, method, depth) = key;
                SummaryRow {
                    dataset,
                    method,
                    depth,
                    count: rows.len(),
                    runtime: Stat::of(rows.iter().map(|r| r.runtime())),
                    train_accuracy: Stat::of(rows.iter().map(|r| r.train_accuracy())),
                    test_accuracy: Stat::of(rows.iter().map(|r| r.test_accuracy())),
                }
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a TrialResult;
    type IntoIter = std::slice::Iter<'a, TrialResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Sample mean and standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation (n - 1); zero for a single value
    pub std: f64,
}

impl Stat {
    /// Mean and sample standard deviation of `values`.
    #[allow(clippy::cast_precision_loss)]
    pub fn of(values: impl Iterator<Item = f64>) -> Self {
        let values: Vec<f64> = values.collect();
        if values.is_empty() {
            return Self { mean: 0.0, std: 0.0 };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        Self { mean, std }
    }
}

/// One line of the aggregated summary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Dataset display name
    pub dataset: String,
    /// Method name
    pub method: String,
    /// Depth limit
    pub depth: usize,
    /// Number of repetitions aggregated
    pub count: usize,
    /// Fit time in seconds
    pub runtime: Stat,
    /// Training accuracy in percent
    pub train_accuracy: Stat,
    /// Test accuracy in percent
    pub test_accuracy: Stat,
}

impl SummaryRow {
    /// Header matching [`SummaryRow::table_line`].
    #[must_use]
    pub fn table_header() -> String {
        format!(
            "{:10} | {:14} | {:>5} | {:>3} | {:>17} | {:>15} | {:>15}",
            "Dataset", "Method", "Depth", "N", "Runtime (s)", "Train Acc (%)", "Test Acc (%)"
        )
    }

    /// Fixed-width row for console output.
    #[must_use]
    pub fn table_line(&self) -> String {
        format!(
            "{:10} | {:14} | {:>5} | {:>3} | {:>8.3} ± {:<6.3} | {:>6.2} ± {:<6.2} | {:>6.2} ± {:<6.2}",
            self.dataset,
            self.method,
            self.depth,
            self.count,
            self.runtime.mean,
            self.runtime.std,
            self.train_accuracy.mean,
            self.train_accuracy.std,
            self.test_accuracy.mean,
            self.test_accuracy.std
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::TrialSpec;

    fn result(dataset: &str, method: &str, depth: usize, run: u32, test: f64) -> TrialResult {
        let spec = TrialSpec {
            dataset: dataset.to_string(),
            method: method.to_string(),
            depth,
            run,
        };
        TrialResult::new(&spec, 0.5, 90.0, test)
    }

    #[test]
    fn test_table_default() {
        let table = ResultTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.failures().is_empty());
    }

    #[test]
    fn test_table_preserves_append_order() {
        let mut table = ResultTable::new();
        table.push(result("Wilt", "CART", 2, 1, 80.0));
        table.push(result("Bank", "CART", 2, 1, 70.0));
        let datasets: Vec<&str> = table.iter().map(TrialResult::dataset).collect();
        assert_eq!(datasets, vec!["Wilt", "Bank"]);
        assert_eq!(table.for_dataset("Bank").len(), 1);
    }

    #[test]
    fn test_summary_groups_in_first_seen_order() {
        let mut table = ResultTable::new();
        table.push(result("Bank", "CART", 3, 1, 80.0));
        table.push(result("Bank", "Optimal", 3, 1, 90.0));
        table.push(result("Bank", "CART", 3, 2, 84.0));

        let summary = table.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].method, "CART");
        assert_eq!(summary[0].count, 2);
        assert!((summary[0].test_accuracy.mean - 82.0).abs() < 1e-12);
        assert!((summary[0].test_accuracy.std - 8.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(summary[1].method, "Optimal");
        assert!(summary[1].test_accuracy.std.abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_batch_shape() {
        let mut table = ResultTable::new();
        table.push(result("Bank", "CART", 2, 1, 80.0));
        table.push(result("Bank", "CART", 3, 1, 81.0));
        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 7);
        assert_eq!(batch.schema(), ResultTable::schema());
    }

    #[test]
    fn test_summary_line_contains_values() {
        let mut table = ResultTable::new();
        table.push(result("Bank", "CART", 2, 1, 80.0));
        let line = table.summary()[0].table_line();
        assert!(line.starts_with("Bank"));
        assert!(line.contains("80.00"));
    }
}
