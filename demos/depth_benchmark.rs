//! Depth Benchmark Example
//!
//! Runs the full grid (datasets × depths × repetitions × methods) on
//! in-memory datasets, prints the summary, then melts the results and
//! renders the faceted comparison chart.
//!
//! Run with: cargo run --example depth_benchmark

use std::fs;
use treebench::classifier::MethodRegistry;
use treebench::dataset::{Dataset, InMemorySource};
use treebench::experiment::SummaryRow;
use treebench::grid::{GridRunner, GridSpec};
use treebench::plot::{render_svg, FacetGrid, PlotConfig};
use treebench::reshape::{melt, Metric};

fn synthetic(name: &str, n: u32, modulus: u32) -> Dataset {
    let features: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            vec![
                f64::from(i % modulus),
                f64::from((i * 7) % 13),
                f64::from((i * 3) % 29),
            ]
        })
        .collect();
    let labels = features
        .iter()
        .map(|row| i64::from((row[0] * 2.0 + row[1]) > f64::from(modulus) + 4.0))
        .collect();
    Dataset::new(name, features, labels).unwrap()
}

fn main() {
    println!("=== treebench: Depth Benchmark ===\n");

    let source = InMemorySource::new()
        .with(synthetic("bank", 300, 11))
        .with(synthetic("wilt", 240, 7));
    let methods = MethodRegistry::builtin().detect(None).unwrap();
    for skipped in methods.skipped() {
        println!("Skipping {}: {}", skipped.method, skipped.reason);
    }

    let spec = GridSpec {
        datasets: vec!["bank".to_string(), "wilt".to_string()],
        depths: vec![1, 2, 3],
        repetitions: 3,
        ..GridSpec::default()
    };
    println!(
        "Grid: {} trials ({} methods)\n",
        spec.trial_count(methods.factories().len()),
        methods.factories().len()
    );

    let report = GridRunner::new(&source, &methods, spec)
        .run_with(|event| println!("  {}", event.progress_line()))
        .unwrap();

    println!("\n{}", SummaryRow::table_header());
    for row in report.table.summary() {
        println!("{}", row.table_line());
    }

    let long = melt(&report.table, &Metric::ALL).unwrap();
    let config = PlotConfig::default();
    let grid = FacetGrid::build(&long, &config).unwrap();
    println!(
        "\nFacet grid: {} rows × {} columns, legend in panel {:?}",
        grid.rows().len(),
        grid.columns().len(),
        grid.legend_panel().map(|p| (p.row, p.col))
    );

    let path = std::env::temp_dir().join("treebench_depth_benchmark.svg");
    fs::write(&path, render_svg(&grid, &config)).unwrap();
    println!("Chart written to {}", path.display());
}
