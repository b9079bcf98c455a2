//! End-to-end pipeline tests: files on disk -> grid -> table -> long form ->
//! chart and Parquet.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use treebench::classifier::{
    Classifier, ClassifierFactory, MethodRegistry, TreeParams, CART, OPTIMAL,
};
use treebench::dataset::{DatasetSource, DirectorySource, Label};
use treebench::grid::{GridRunner, GridSpec};
use treebench::plot::{render_svg, FacetGrid, PlotConfig};
use treebench::reshape::{melt, Metric};
use treebench::split::{repetition_seed, SplitGenerator};
use treebench::storage::ResultsStore;
use treebench::Result;

// =============================================================================
// Stub adapters
// =============================================================================

struct Majority {
    label: Label,
}

impl Classifier for Majority {
    fn method(&self) -> &str {
        "Majority"
    }

    fn fit(&mut self, _features: &[Vec<f64>], labels: &[Label]) -> Result<()> {
        let ones = labels.iter().filter(|&&l| l == 1).count();
        self.label = Label::from(ones * 2 > labels.len());
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>> {
        Ok(vec![self.label; features.len()])
    }
}

struct MajorityFactory;

impl ClassifierFactory for MajorityFactory {
    fn method(&self) -> &str {
        "Majority"
    }

    fn build(&self, _params: &TreeParams) -> Box<dyn Classifier> {
        Box::new(Majority { label: 0 })
    }
}

/// Reads the label back out of feature 0
struct Perfect;

impl Classifier for Perfect {
    fn method(&self) -> &str {
        "Perfect"
    }

    fn fit(&mut self, _features: &[Vec<f64>], _labels: &[Label]) -> Result<()> {
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>> {
        Ok(features.iter().map(|row| row[0] as Label).collect())
    }
}

struct PerfectFactory;

impl ClassifierFactory for PerfectFactory {
    fn method(&self) -> &str {
        "Perfect"
    }

    fn build(&self, _params: &TreeParams) -> Box<dyn Classifier> {
        Box::new(Perfect)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// 100 samples, 3 features, label = 1 for 70 of them; feature 0 is the label.
fn write_synthetic(dir: &Path, name: &str) {
    let mut text = String::new();
    for i in 0..100_i32 {
        let label = i32::from(i % 10 < 7);
        let _ = writeln!(
            text,
            "{label} {label}.0 {:.3} {:.3}",
            f64::from(i) / 10.0,
            f64::from((i * 37) % 100) / 7.0
        );
    }
    fs::write(dir.join(format!("{name}.txt")), text).unwrap();
}

/// Two informative features plus noise, labels depend on a depth-2 rule.
fn write_rule_dataset(dir: &Path, name: &str) {
    let mut text = String::new();
    for i in 0..60_i32 {
        let a = f64::from(i % 10);
        let b = f64::from((i * 7) % 13);
        let label = i32::from((a < 5.0) != (b < 6.0));
        let _ = writeln!(text, "{label} {a} {b} {}", f64::from(i % 4));
    }
    fs::write(dir.join(format!("{name}.txt")), text).unwrap();
}

// =============================================================================
// Harness scenario with stub adapters
// =============================================================================

#[test]
fn test_majority_and_perfect_adapters() {
    let dir = tempfile::tempdir().unwrap();
    write_synthetic(dir.path(), "synthetic");
    let source = DirectorySource::new(dir.path());

    let methods = MethodRegistry::new()
        .with(MajorityFactory)
        .with(PerfectFactory)
        .detect(None)
        .unwrap();
    let spec = GridSpec {
        datasets: vec!["synthetic".to_string()],
        depths: vec![2],
        repetitions: 1,
        ..GridSpec::default()
    };
    let report = GridRunner::new(&source, &methods, spec).run().unwrap();
    assert_eq!(report.table.len(), 2);

    let majority = &report.table.results()[0];
    let perfect = &report.table.results()[1];
    assert_eq!(majority.method(), "Majority");
    assert_eq!(perfect.method(), "Perfect");

    // pooled over the 80/20 split, the majority adapter is right exactly on
    // the majority-class samples
    let dataset = source.load("synthetic").unwrap();
    let majority_pct = dataset.majority_fraction() * 100.0;
    let pooled = (majority.train_accuracy() * 80.0 + majority.test_accuracy() * 20.0) / 100.0;
    assert!((pooled - majority_pct).abs() <= 1.0, "{pooled} vs {majority_pct}");

    // and per side it matches the class balance of the seeded split
    let split = SplitGenerator::new(0.2)
        .unwrap()
        .split_dataset(&dataset, repetition_seed(42, 1))
        .unwrap();
    let train = split.train(&dataset);
    #[allow(clippy::cast_precision_loss)]
    let train_ones = train.labels.iter().filter(|&&l| l == 1).count() as f64 / train.len() as f64;
    assert!((majority.train_accuracy() - train_ones * 100.0).abs() < 1e-9);

    assert!((perfect.train_accuracy() - 100.0).abs() < f64::EPSILON);
    assert!((perfect.test_accuracy() - 100.0).abs() < f64::EPSILON);
    assert!(perfect.runtime() >= 0.0);
}

// =============================================================================
// Full pipeline with the real tree methods
// =============================================================================

#[test]
fn test_full_pipeline_with_real_methods() {
    let dir = tempfile::tempdir().unwrap();
    write_rule_dataset(dir.path(), "bank");
    write_rule_dataset(dir.path(), "wilt");
    let source = DirectorySource::new(dir.path());

    let requested = vec![OPTIMAL.to_string(), CART.to_string()];
    let methods = MethodRegistry::builtin().detect(Some(&requested)).unwrap();
    let spec = GridSpec {
        datasets: vec!["bank".to_string(), "wilt".to_string(), "missing".to_string()],
        depths: vec![1, 2],
        repetitions: 2,
        ..GridSpec::default()
    };

    let mut lines = Vec::new();
    let report = GridRunner::new(&source, &methods, spec)
        .run_with(|event| lines.push(event.progress_line()))
        .unwrap();

    assert_eq!(report.table.len(), 2 * 2 * 2 * 2);
    assert_eq!(lines.len(), report.table.len());
    assert!(lines[0].starts_with("Bank"));
    assert!(lines[0].contains("d=1"));
    assert_eq!(report.dataset_failures.len(), 1);
    assert!(report
        .table
        .iter()
        .all(|r| (0.0..=100.0).contains(&r.train_accuracy()) && r.runtime() >= 0.0));

    // the exact method never trains worse than the greedy one on the same split
    let rows = report.table.results();
    for pair in rows.chunks(2) {
        assert_eq!(pair[0].method(), OPTIMAL);
        assert_eq!(pair[1].method(), CART);
        assert!(pair[0].train_accuracy() + 1e-9 >= pair[1].train_accuracy());
    }
    // depth 2 solves the rule exactly
    assert!(rows
        .iter()
        .filter(|r| r.method() == OPTIMAL && r.depth() == 2)
        .all(|r| (r.train_accuracy() - 100.0).abs() < 1e-9));

    // reshape
    let long = melt(&report.table, &Metric::ALL).unwrap();
    assert_eq!(long.len(), 3 * report.table.len());

    // chart
    let config = PlotConfig::default();
    let grid = FacetGrid::build(&long, &config).unwrap();
    assert_eq!(grid.panels().len(), 3 * 2);
    let svg = render_svg(&grid, &config);
    assert!(svg.contains("Train Accuracy (%)"));
    assert_eq!(svg.matches(r#"class="legend""#).count(), 1);

    // storage round trip
    let path = dir.path().join("out").join("results.parquet");
    ResultsStore::new(vec![report.table.to_record_batch().unwrap()])
        .write_parquet(&path)
        .unwrap();
    let loaded = ResultsStore::load_parquet(&path)
        .unwrap()
        .to_result_table()
        .unwrap();
    assert_eq!(loaded, report.table);

    // summary: one row per (dataset, method, depth)
    let summary = report.table.summary();
    assert_eq!(summary.len(), 2 * 2 * 2);
    assert!(summary.iter().all(|row| row.count == 2));
}

#[test]
fn test_report_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    write_rule_dataset(dir.path(), "bank");
    let source = DirectorySource::new(dir.path());
    let methods = MethodRegistry::builtin().detect(None).unwrap();
    let spec = GridSpec {
        datasets: vec!["bank".to_string()],
        depths: vec![1],
        repetitions: 1,
        ..GridSpec::default()
    };
    let report = GridRunner::new(&source, &methods, spec).run().unwrap();

    let json = serde_json::to_value(&report).unwrap();
    let first = &json["table"]["results"][0];
    assert_eq!(first["Dataset"], "Bank");
    assert_eq!(first["Run"], 1);
    assert!(first["Test Accuracy"].is_number());
}
