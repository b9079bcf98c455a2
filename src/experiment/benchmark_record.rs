//! Benchmark Record - metadata for one execution of the experiment grid

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Benchmark Record describes one grid run.
///
/// The result table itself is not stored here; this carries the identity,
/// timestamp and a snapshot of the configuration that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkRecord {
    benchmark_id: String,
    name: String,
    created_at: DateTime<Utc>,
    config: Option<serde_json::Value>,
}

impl BenchmarkRecord {
    /// Create a new benchmark record with the current timestamp.
    ///
    /// # Arguments
    ///
    /// * `benchmark_id` - Unique identifier for the run
    /// * `name` - Human-readable name
    #[must_use]
    pub fn new(benchmark_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            benchmark_id: benchmark_id.into(),
            name: name.into(),
            created_at: Utc::now(),
            config: None,
        }
    }

    /// Create a builder for constructing a record with optional fields.
    #[must_use]
    pub fn builder(
        benchmark_id: impl Into<String>,
        name: impl Into<String>,
    ) -> BenchmarkRecordBuilder {
        BenchmarkRecordBuilder::new(benchmark_id, name)
    }

    /// Get the benchmark ID.
    #[must_use]
    pub fn benchmark_id(&self) -> &str {
        &self.benchmark_id
    }

    /// Get the benchmark name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the configuration snapshot, if any.
    #[must_use]
    pub const fn config(&self) -> Option<&serde_json::Value> {
        self.config.as_ref()
    }
}

/// Builder for `BenchmarkRecord`.
#[derive(Debug)]
pub struct BenchmarkRecordBuilder {
    benchmark_id: String,
    name: String,
    created_at: DateTime<Utc>,
    config: Option<serde_json::Value>,
}

impl BenchmarkRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(benchmark_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            benchmark_id: benchmark_id.into(),
            name: name.into(),
            created_at: Utc::now(),
            config: None,
        }
    }

    /// Attach a configuration snapshot.
    #[must_use]
    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build the `BenchmarkRecord`.
    #[must_use]
    pub fn build(self) -> BenchmarkRecord {
        BenchmarkRecord {
            benchmark_id: self.benchmark_id,
            name: self.name,
            created_at: self.created_at,
            config: self.config,
        }
    }
}

/// Identifier derived from a timestamp, e.g. `bench-20260101T120000Z`.
#[must_use]
pub fn timestamp_id(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}-{}", at.format("%Y%m%dT%H%M%SZ"))
}
