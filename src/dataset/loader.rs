//! Whitespace-delimited dataset reader
//!
//! File format: no header, one sample per line, column 0 is the integer
//! class label and columns 1..N are numeric features. Blank lines are
//! ignored.

use super::{Dataset, Label};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Somewhere datasets can be loaded from by name
pub trait DatasetSource {
    /// Load the dataset called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DatasetNotFound`] if no such dataset exists and
    /// [`Error::DatasetParse`] / [`Error::ShapeMismatch`] if it is malformed.
    fn load(&self, name: &str) -> Result<Dataset>;
}

/// Reads `{root}/{name}.{extension}` from disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extension: String,
}

impl DirectorySource {
    /// Source rooted at `root`, reading `.txt` files
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "txt".to_string(),
        }
    }

    /// Change the file extension probed for each dataset
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Path a dataset name resolves to
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{}", self.extension))
    }
}

impl DatasetSource for DirectorySource {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn load(&self, name: &str) -> Result<Dataset> {
        let path = self.path_for(name);
        let file = File::open(&path).map_err(|_| Error::DatasetNotFound { path: path.clone() })?;
        let dataset = parse_dataset(name, &path, BufReader::new(file))?;
        debug!(
            n_samples = dataset.n_samples(),
            n_features = dataset.n_features(),
            "loaded dataset"
        );
        Ok(dataset)
    }
}

/// Datasets held in memory, mostly for tests and demos
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    datasets: BTreeMap<String, Dataset>,
}

impl InMemorySource {
    /// Empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset under its own name
    #[must_use]
    pub fn with(mut self, dataset: Dataset) -> Self {
        self.datasets.insert(dataset.name().to_string(), dataset);
        self
    }
}

impl DatasetSource for InMemorySource {
    fn load(&self, name: &str) -> Result<Dataset> {
        self.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DatasetNotFound {
                path: PathBuf::from(name),
            })
    }
}

/// Parse a whitespace-delimited dataset from `reader`.
///
/// `path` is only used in error messages.
///
/// # Errors
///
/// Returns [`Error::DatasetParse`] for unparseable or non-finite cells and
/// rows whose width differs from the first row, and [`Error::ShapeMismatch`]
/// when the file holds no samples.
pub fn parse_dataset<R: BufRead>(name: &str, path: &Path, reader: R) -> Result<Dataset> {
    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut width: Option<usize> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let parse_err = |message: String| Error::DatasetParse {
            path: path.to_path_buf(),
            line: line_no,
            message,
        };

        let mut cells = line.split_whitespace();
        let Some(label_cell) = cells.next() else {
            continue;
        };
        let label = parse_label(label_cell).ok_or_else(|| {
            parse_err(format!("label '{label_cell}' is not an integer"))
        })?;

        let row = cells
            .map(|cell| match cell.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(parse_err(format!("feature '{cell}' is not a finite number"))),
            })
            .collect::<Result<Vec<f64>>>()?;

        match width {
            None => width = Some(row.len()),
            Some(w) if w != row.len() => {
                return Err(parse_err(format!(
                    "expected {w} features, found {}",
                    row.len()
                )));
            }
            Some(_) => {}
        }

        labels.push(label);
        features.push(row);
    }

    Dataset::new(name, features, labels)
}

// Labels are sometimes written as `1.0`; accept integral floats.
#[allow(clippy::cast_possible_truncation)]
fn parse_label(cell: &str) -> Option<Label> {
    cell.parse::<Label>().ok().or_else(|| {
        cell.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as Label)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<Dataset> {
        parse_dataset("toy", Path::new("toy.txt"), Cursor::new(text))
    }

    #[test]
    fn test_parse_basic() {
        let ds = parse("0 1.5 2.0\n1 3.0 -4.25\n\n1 0 0\n").unwrap();
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.n_features(), 2);
        assert_eq!(ds.labels(), &[0, 1, 1]);
        assert!((ds.features()[1][1] + 4.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_float_label() {
        let ds = parse("1.0 2\n0.0 3\n").unwrap();
        assert_eq!(ds.labels(), &[1, 0]);
    }

    #[test]
    fn test_parse_rejects_bad_label() {
        let err = parse("a 1 2\n").unwrap_err();
        assert!(matches!(err, Error::DatasetParse { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_ragged() {
        let err = parse("0 1 2\n1 3\n").unwrap_err();
        match err {
            Error::DatasetParse { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("expected 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_nan() {
        assert!(parse("0 NaN\n").is_err());
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(matches!(parse("\n\n").unwrap_err(), Error::ShapeMismatch(_)));
    }

    #[test]
    fn test_in_memory_missing() {
        let source = InMemorySource::new();
        assert!(matches!(
            source.load("bank").unwrap_err(),
            Error::DatasetNotFound { .. }
        ));
    }

    #[test]
    fn test_directory_source_path() {
        let source = DirectorySource::new("train-datasets");
        assert_eq!(
            source.path_for("wilt"),
            PathBuf::from("train-datasets/wilt.txt")
        );
    }
}
