//! Wide-to-long reshaping ("melt")
//!
//! Each wide row `(Depth, Method, Dataset, Run, m1, m2, ...)` becomes one
//! long record per selected metric, `(Depth, Method, Dataset, Run,
//! variable, value)`. Output length is always `rows * metrics`, records
//! come out metric-major (all rows for the first metric, then the next),
//! and the input table is only borrowed.

use crate::experiment::{ResultTable, TrialResult};
use crate::{Error, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A metric column of the wide result table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    /// Fit duration in seconds
    #[serde(rename = "Runtime")]
    Runtime,
    /// Training accuracy in percent
    #[serde(rename = "Train Accuracy")]
    TrainAccuracy,
    /// Test accuracy in percent
    #[serde(rename = "Test Accuracy")]
    TestAccuracy,
}

impl Metric {
    /// All metrics, in wide-table column order
    pub const ALL: [Self; 3] = [Self::Runtime, Self::TrainAccuracy, Self::TestAccuracy];

    /// Column name in the wide table
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Runtime => "Runtime",
            Self::TrainAccuracy => "Train Accuracy",
            Self::TestAccuracy => "Test Accuracy",
        }
    }

    /// Axis label including the unit
    #[must_use]
    pub const fn axis_label(self) -> &'static str {
        match self {
            Self::Runtime => "Runtime (s)",
            Self::TrainAccuracy => "Train Accuracy (%)",
            Self::TestAccuracy => "Test Accuracy (%)",
        }
    }

    /// Whether the metric is a percentage
    #[must_use]
    pub const fn is_percentage(self) -> bool {
        !matches!(self, Self::Runtime)
    }

    /// Read this metric from a wide row
    #[must_use]
    pub fn value_of(self, result: &TrialResult) -> f64 {
        match self {
            Self::Runtime => result.runtime(),
            Self::TrainAccuracy => result.train_accuracy(),
            Self::TestAccuracy => result.test_accuracy(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.column().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown metric '{s}'")))
    }
}

/// One (trial, metric) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    /// Depth limit
    #[serde(rename = "Depth")]
    pub depth: usize,
    /// Method name
    #[serde(rename = "Method")]
    pub method: String,
    /// Dataset display name
    #[serde(rename = "Dataset")]
    pub dataset: String,
    /// Repetition index
    #[serde(rename = "Run")]
    pub run: u32,
    /// Which metric `value` holds
    pub variable: Metric,
    /// Metric value
    pub value: f64,
}

/// Long-form table, independent of the table it was derived from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTable {
    records: Vec<LongRecord>,
}

impl LongTable {
    /// Records in metric-major order
    #[must_use]
    pub fn records(&self) -> &[LongRecord] {
        &self.records
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records for one metric
    pub fn metric(&self, metric: Metric) -> impl Iterator<Item = &LongRecord> {
        self.records.iter().filter(move |r| r.variable == metric)
    }

    /// Distinct dataset names in first-seen order
    #[must_use]
    pub fn datasets(&self) -> Vec<&str> {
        first_seen(self.records.iter().map(|r| r.dataset.as_str()))
    }

    /// Distinct method names in first-seen order
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        first_seen(self.records.iter().map(|r| r.method.as_str()))
    }

    /// Arrow schema of [`LongTable::to_record_batch`]
    #[must_use]
    pub fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("Depth", DataType::UInt32, false),
            Field::new("Method", DataType::Utf8, false),
            Field::new("Dataset", DataType::Utf8, false),
            Field::new("Run", DataType::UInt32, false),
            Field::new("variable", DataType::Utf8, false),
            Field::new("value", DataType::Float64, false),
        ]))
    }

    /// Convert to a columnar batch.
    ///
    /// # Errors
    ///
    /// Returns an Arrow error if the batch cannot be assembled.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let r = &self.records;
        let columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from_iter_values(r.iter().map(|x| x.depth as u32))),
            Arc::new(StringArray::from_iter_values(r.iter().map(|x| x.method.as_str()))),
            Arc::new(StringArray::from_iter_values(r.iter().map(|x| x.dataset.as_str()))),
            Arc::new(UInt32Array::from_iter_values(r.iter().map(|x| x.run))),
            Arc::new(StringArray::from_iter_values(r.iter().map(|x| x.variable.column()))),
            Arc::new(Float64Array::from_iter_values(r.iter().map(|x| x.value))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }
}

fn first_seen<'a>(items: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::new();
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

/// Unpivot `metrics` from the wide table.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `metrics` is empty or names a metric
/// twice.
pub fn melt(table: &ResultTable, metrics: &[Metric]) -> Result<LongTable> {
    if metrics.is_empty() {
        return Err(Error::InvalidInput("no metrics selected to unpivot".to_string()));
    }
    for (i, m) in metrics.iter().enumerate() {
        if metrics[..i].contains(m) {
            return Err(Error::InvalidInput(format!("metric '{m}' selected twice")));
        }
    }

    let records = metrics
        .iter()
        .flat_map(|&metric| {
            table.iter().map(move |row| LongRecord {
                depth: row.depth(),
                method: row.method().to_string(),
                dataset: row.dataset().to_string(),
                run: row.run(),
                variable: metric,
                value: metric.value_of(row),
            })
        })
        .collect();

    Ok(LongTable { records })
}
