//! Benchmark results schema
//!
//! ## Schema Overview
//!
//! ```text
//! BenchmarkRecord (1) ──< TrialResult (N)   [ResultTable, wide form]
//!                     └─< TrialFailure (N)  [recorded, never plotted]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use treebench::experiment::{ResultTable, TrialResult, TrialSpec};
//!
//! let mut table = ResultTable::new();
//! let spec = TrialSpec {
//!     dataset: "Bank".to_string(),
//!     method: "CART".to_string(),
//!     depth: 2,
//!     run: 1,
//! };
//! table.push(TrialResult::new(&spec, 0.012, 92.1, 90.4));
//! assert_eq!(table.len(), 1);
//! ```

mod benchmark_record;
mod result_table;
mod trial_record;

pub use benchmark_record::{timestamp_id, BenchmarkRecord, BenchmarkRecordBuilder};
pub use result_table::{ResultTable, Stat, SummaryRow};
pub use trial_record::{TrialFailure, TrialResult, TrialSpec};
