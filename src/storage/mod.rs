//! Results store (Arrow/Parquet)
//!
//! **Append-only**: result tables are written once per benchmark run and
//! only ever extended with whole batches. All batches in a store share one
//! schema; [`ResultsStore::append_batch`] rejects anything else.
//!
//! ```rust
//! use treebench::experiment::{ResultTable, TrialResult, TrialSpec};
//! use treebench::storage::ResultsStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut table = ResultTable::new();
//! let spec = TrialSpec { dataset: "Bank".into(), method: "CART".into(), depth: 2, run: 1 };
//! table.push(TrialResult::new(&spec, 0.01, 91.0, 89.5));
//!
//! let mut store = ResultsStore::new(vec![]);
//! store.append_batch(table.to_record_batch()?)?;
//! assert_eq!(store.num_rows(), 1);
//! assert_eq!(store.to_result_table()?, table);
//! # Ok(())
//! # }
//! ```

use crate::experiment::{ResultTable, TrialResult, TrialSpec};
use crate::{Error, Result};
use arrow::array::{Array, Float64Array, StringArray, UInt32Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

/// In-memory set of result batches with Parquet persistence
#[derive(Debug, Clone, Default)]
pub struct ResultsStore {
    batches: Vec<RecordBatch>,
}

impl ResultsStore {
    /// Create a store from existing batches
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Load every batch from a Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::StorageError(format!("Failed to open Parquet file {}: {e}", path.display()))
        })?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?
            .build()
            .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| {
                Error::StorageError(format!("Failed to read record batch: {e}"))
            })?;
            batches.push(batch);
        }

        debug!(path = %path.display(), batches = batches.len(), "loaded results");
        Ok(Self { batches })
    }

    /// Write all batches to one Parquet file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns error if the store is empty or the file cannot be written.
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let Some(first) = self.batches.first() else {
            return Err(Error::StorageError("Nothing to write: store is empty".to_string()));
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, first.schema(), None)?;
        for batch in &self.batches {
            writer.write(batch)?;
        }
        writer.close()?;

        info!(path = %path.display(), rows = self.num_rows(), "results written");
        Ok(())
    }

    /// All record batches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total rows across batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Append a batch (the only supported write).
    ///
    /// # Errors
    ///
    /// Returns error if batch schema doesn't match existing batches
    pub fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if let Some(existing) = self.batches.first() {
            let existing_schema = existing.schema();
            if batch.schema() != existing_schema {
                return Err(Error::StorageError(format!(
                    "Schema mismatch: expected {:?}, got {:?}",
                    existing_schema,
                    batch.schema()
                )));
            }
        }

        self.batches.push(batch);
        Ok(())
    }

    /// Rebuild the wide result table from stored batches.
    ///
    /// # Errors
    ///
    /// Returns error if a batch does not have the wide result schema.
    pub fn to_result_table(&self) -> Result<ResultTable> {
        let mut table = ResultTable::new();
        for batch in &self.batches {
            let method = column::<StringArray>(batch, "Method")?;
            let dataset = column::<StringArray>(batch, "Dataset")?;
            let run = column::<UInt32Array>(batch, "Run")?;
            let depth = column::<UInt32Array>(batch, "Depth")?;
            let runtime = column::<Float64Array>(batch, "Runtime")?;
            let train = column::<Float64Array>(batch, "Train Accuracy")?;
            let test = column::<Float64Array>(batch, "Test Accuracy")?;

            for i in 0..batch.num_rows() {
                let spec = TrialSpec {
                    dataset: dataset.value(i).to_string(),
                    method: method.value(i).to_string(),
                    depth: depth.value(i) as usize,
                    run: run.value(i),
                };
                table.push(TrialResult::new(
                    &spec,
                    runtime.value(i),
                    train.value(i),
                    test.value(i),
                ));
            }
        }
        Ok(table)
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::StorageError(format!("Missing or mistyped column '{name}'")))
}
