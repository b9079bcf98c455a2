//! Experiment grid tests
//!
//! Stub adapters record what the harness hands them, so these tests check
//! ordering, split sharing and failure isolation without depending on any
//! real tree method.

use std::sync::{Arc, Mutex};

use treebench::classifier::{
    Availability, Classifier, ClassifierFactory, MethodRegistry, TreeParams,
};
use treebench::dataset::{Dataset, InMemorySource, Label};
use treebench::grid::{GridRunner, GridSpec, TrialEvent};
use treebench::split::{repetition_seed, SplitGenerator};
use treebench::{Error, Result};

// =============================================================================
// Stub adapters
// =============================================================================

/// `(method, depth, training features)` for every fit call
type FitLog = Arc<Mutex<Vec<(String, usize, Vec<Vec<f64>>)>>>;

struct Recording {
    method: String,
    depth: usize,
    log: FitLog,
}

impl Classifier for Recording {
    fn method(&self) -> &str {
        &self.method
    }

    fn fit(&mut self, features: &[Vec<f64>], _labels: &[Label]) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push((self.method.clone(), self.depth, features.to_vec()));
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>> {
        Ok(vec![0; features.len()])
    }
}

struct RecordingFactory {
    method: &'static str,
    log: FitLog,
}

impl ClassifierFactory for RecordingFactory {
    fn method(&self) -> &str {
        self.method
    }

    fn build(&self, params: &TreeParams) -> Box<dyn Classifier> {
        Box::new(Recording {
            method: self.method.to_string(),
            depth: params.max_depth,
            log: Arc::clone(&self.log),
        })
    }
}

/// Fails to fit at one depth, succeeds elsewhere
struct FlakyFactory {
    failing_depth: usize,
}

struct Flaky {
    fail: bool,
}

impl Classifier for Flaky {
    fn method(&self) -> &str {
        "Flaky"
    }

    fn fit(&mut self, _features: &[Vec<f64>], _labels: &[Label]) -> Result<()> {
        if self.fail {
            return Err(Error::FitFailed {
                method: "Flaky".to_string(),
                reason: "depth not supported".to_string(),
            });
        }
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>> {
        Ok(vec![1; features.len()])
    }
}

impl ClassifierFactory for FlakyFactory {
    fn method(&self) -> &str {
        "Flaky"
    }

    fn build(&self, params: &TreeParams) -> Box<dyn Classifier> {
        Box::new(Flaky {
            fail: params.max_depth == self.failing_depth,
        })
    }
}

struct UnavailableFactory;

impl ClassifierFactory for UnavailableFactory {
    fn method(&self) -> &str {
        "Missing"
    }

    fn availability(&self) -> Availability {
        Availability::Unavailable("not compiled in".to_string())
    }

    fn build(&self, _params: &TreeParams) -> Box<dyn Classifier> {
        unreachable!("unavailable methods are never built")
    }
}

fn dataset(name: &str, n: i32) -> Dataset {
    let features = (0..n).map(|i| vec![f64::from(i), f64::from(i * 7 % 11)]).collect();
    let labels = (0..n).map(|i| i64::from(i % 3 == 0)).collect();
    Dataset::new(name, features, labels).unwrap()
}

fn spec(datasets: &[&str], depths: Vec<usize>, repetitions: u32) -> GridSpec {
    GridSpec {
        datasets: datasets.iter().map(ToString::to_string).collect(),
        depths,
        repetitions,
        ..GridSpec::default()
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_grid_row_order() {
    let log = FitLog::default();
    let source = InMemorySource::new()
        .with(dataset("bank", 30))
        .with(dataset("wilt", 30));
    let methods = MethodRegistry::new()
        .with(RecordingFactory {
            method: "A",
            log: Arc::clone(&log),
        })
        .with(RecordingFactory {
            method: "B",
            log: Arc::clone(&log),
        })
        .detect(None)
        .unwrap();

    let report = GridRunner::new(&source, &methods, spec(&["bank", "wilt"], vec![2, 3, 4], 2))
        .run()
        .unwrap();

    assert_eq!(report.table.len(), 24);
    let mut expected = Vec::new();
    for dataset in ["Bank", "Wilt"] {
        for depth in [2, 3, 4] {
            for run in [1, 2] {
                for method in ["A", "B"] {
                    expected.push((dataset.to_string(), depth, run, method.to_string()));
                }
            }
        }
    }
    let actual: Vec<(String, usize, u32, String)> = report
        .table
        .iter()
        .map(|r| (r.dataset().to_string(), r.depth(), r.run(), r.method().to_string()))
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_depth_forwarded_to_adapter() {
    let log = FitLog::default();
    let source = InMemorySource::new().with(dataset("bank", 20));
    let methods = MethodRegistry::new()
        .with(RecordingFactory {
            method: "A",
            log: Arc::clone(&log),
        })
        .detect(None)
        .unwrap();

    GridRunner::new(&source, &methods, spec(&["bank"], vec![5, 2], 1))
        .run()
        .unwrap();

    let depths: Vec<usize> = log.lock().unwrap().iter().map(|(_, d, _)| *d).collect();
    assert_eq!(depths, vec![5, 2]);
}

// =============================================================================
// Split sharing
// =============================================================================

#[test]
fn test_methods_share_splits_within_run() {
    let log = FitLog::default();
    let data = dataset("bank", 50);
    let source = InMemorySource::new().with(data.clone());
    let methods = MethodRegistry::new()
        .with(RecordingFactory {
            method: "A",
            log: Arc::clone(&log),
        })
        .with(RecordingFactory {
            method: "B",
            log: Arc::clone(&log),
        })
        .detect(None)
        .unwrap();

    GridRunner::new(&source, &methods, spec(&["bank"], vec![2, 3], 3))
        .run()
        .unwrap();

    let fits = log.lock().unwrap();
    assert_eq!(fits.len(), 2 * 3 * 2);

    // consecutive fits are (A, B) for the same (depth, run)
    for pair in fits.chunks(2) {
        assert_eq!(pair[0].0, "A");
        assert_eq!(pair[1].0, "B");
        assert_eq!(pair[0].2, pair[1].2);
    }

    // the same run at different depths also reuses the split
    assert_eq!(fits[0].2, fits[6].2);
    // different runs differ
    assert_ne!(fits[0].2, fits[2].2);

    // and it is exactly the seeded split for run 1
    let split = SplitGenerator::new(0.2)
        .unwrap()
        .split_dataset(&data, repetition_seed(42, 1))
        .unwrap();
    assert_eq!(fits[0].2, split.train(&data).features);
}

// =============================================================================
// Failure isolation
// =============================================================================

#[test]
fn test_unloadable_dataset_skipped() {
    let log = FitLog::default();
    let source = InMemorySource::new().with(dataset("wilt", 20));
    let methods = MethodRegistry::new()
        .with(RecordingFactory {
            method: "A",
            log: Arc::clone(&log),
        })
        .detect(None)
        .unwrap();

    let report = GridRunner::new(&source, &methods, spec(&["bank", "wilt", "bidding"], vec![2], 2))
        .run()
        .unwrap();

    let failed: Vec<&str> = report
        .dataset_failures
        .iter()
        .map(|f| f.dataset.as_str())
        .collect();
    assert_eq!(failed, vec!["bank", "bidding"]);
    assert_eq!(report.table.len(), 2);
}

#[test]
fn test_unsplittable_dataset_contributes_nothing() {
    let log = FitLog::default();
    let source = InMemorySource::new()
        .with(dataset("tiny", 1))
        .with(dataset("wilt", 20));
    let methods = MethodRegistry::new()
        .with(RecordingFactory {
            method: "A",
            log: Arc::clone(&log),
        })
        .detect(None)
        .unwrap();

    let report = GridRunner::new(&source, &methods, spec(&["tiny", "wilt"], vec![2, 3], 2))
        .run()
        .unwrap();

    assert_eq!(report.dataset_failures.len(), 1);
    assert!(report.table.for_dataset("Tiny").is_empty());
    assert_eq!(report.table.for_dataset("Wilt").len(), 4);
}

#[test]
fn test_failed_trial_recorded_and_grid_continues() {
    let source = InMemorySource::new().with(dataset("bank", 20));
    let methods = MethodRegistry::new()
        .with(FlakyFactory { failing_depth: 3 })
        .detect(None)
        .unwrap();

    let mut events = Vec::new();
    let report = GridRunner::new(&source, &methods, spec(&["bank"], vec![2, 3, 4], 2))
        .run_with(|event| {
            events.push(matches!(event, TrialEvent::Completed(_)));
        })
        .unwrap();

    assert_eq!(events, vec![true, true, false, false, true, true]);
    assert_eq!(report.table.len(), 4);
    assert_eq!(report.table.failures().len(), 2);
    let failure = &report.table.failures()[0];
    assert_eq!(failure.spec().depth, 3);
    assert!(failure.reason().contains("depth not supported"));
    assert!(report.table.iter().all(|r| r.depth() != 3));
}

#[test]
fn test_unavailable_method_skipped_for_whole_run() {
    let log = FitLog::default();
    let source = InMemorySource::new().with(dataset("bank", 20));
    let methods = MethodRegistry::new()
        .with(UnavailableFactory)
        .with(RecordingFactory {
            method: "A",
            log: Arc::clone(&log),
        })
        .detect(None)
        .unwrap();

    let report = GridRunner::new(&source, &methods, spec(&["bank"], vec![2, 3], 2))
        .run()
        .unwrap();

    assert_eq!(report.skipped_methods.len(), 1);
    assert_eq!(report.skipped_methods[0].method, "Missing");
    assert_eq!(report.table.len(), 4);
    assert!(report.table.iter().all(|r| r.method() == "A"));
}

#[test]
fn test_invalid_spec_rejected_before_running() {
    let log = FitLog::default();
    let source = InMemorySource::new().with(dataset("bank", 20));
    let methods = MethodRegistry::new()
        .with(RecordingFactory {
            method: "A",
            log: Arc::clone(&log),
        })
        .detect(None)
        .unwrap();

    let result = GridRunner::new(&source, &methods, spec(&["bank"], vec![2], 0)).run();
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(log.lock().unwrap().is_empty());
}
