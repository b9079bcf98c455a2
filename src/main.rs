use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use treebench::classifier::{accuracy, Classifier, MethodRegistry, OptimalTree, TreeParams};
use treebench::config::BenchmarkConfig;
use treebench::dataset::{DatasetSource, DirectorySource};
use treebench::experiment::{ResultTable, SummaryRow, TrialResult};
use treebench::grid::GridRunner;
use treebench::plot::{render_svg, Aggregation, FacetGrid, PlotConfig};
use treebench::reshape::{melt, LongTable, Metric};
use treebench::search::{GridSearch, ParamGrid, Scoring};
use treebench::split::SplitGenerator;
use treebench::storage::ResultsStore;

#[derive(Parser)]
#[command(name = "treebench")]
#[command(about = "Benchmark depth-bounded decision tree methods across datasets and depths")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "treebench=trace")
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Directory holding `<dataset>.txt` files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum AggregationArg {
    /// Mean per depth with a 95% confidence band
    MeanCi,
    /// One line per repetition
    Individual,
}

impl From<AggregationArg> for Aggregation {
    fn from(arg: AggregationArg) -> Self {
        match arg {
            AggregationArg::MeanCi => Self::MeanWithCi,
            AggregationArg::Individual => Self::Individual,
        }
    }
}

/// Overrides applied on top of the configuration file
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// JSON configuration (written with defaults if missing)
    #[arg(long, default_value = "treebench.json")]
    config: PathBuf,

    /// Directory holding `<dataset>.txt` files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Datasets to run, comma separated
    #[arg(long, value_delimiter = ',')]
    datasets: Option<Vec<String>>,

    /// Methods to run, comma separated (default: all available)
    #[arg(long, value_delimiter = ',')]
    methods: Option<Vec<String>>,

    /// Smallest depth limit
    #[arg(long)]
    min_depth: Option<usize>,

    /// Largest depth limit
    #[arg(long)]
    max_depth: Option<usize>,

    /// Repetitions per dataset and depth
    #[arg(long)]
    repetitions: Option<u32>,

    /// Base seed; run `r` uses `seed + r`
    #[arg(long)]
    seed: Option<u64>,

    /// Held-out fraction
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Wide results output (.parquet or .json)
    #[arg(long)]
    results: Option<PathBuf>,

    /// Long-form results output (.parquet or .json)
    #[arg(long)]
    long_results: Option<PathBuf>,

    /// SVG chart output
    #[arg(long)]
    chart: Option<PathBuf>,

    /// How repetitions are drawn in the chart
    #[arg(long, value_enum)]
    aggregation: Option<AggregationArg>,

    /// Verbose classifier logging
    #[arg(long)]
    verbose: bool,
}

impl RunArgs {
    fn apply(self, config: &mut BenchmarkConfig) {
        if let Some(v) = self.data_dir {
            config.data_dir = v;
        }
        if let Some(v) = self.datasets {
            config.datasets = v;
        }
        if let Some(v) = self.methods {
            config.methods = Some(v);
        }
        if let Some(v) = self.min_depth {
            config.min_depth = v;
        }
        if let Some(v) = self.max_depth {
            config.max_depth = v;
        }
        if let Some(v) = self.repetitions {
            config.repetitions = v;
        }
        if let Some(v) = self.seed {
            config.base_seed = v;
        }
        if let Some(v) = self.test_fraction {
            config.test_fraction = v;
        }
        if let Some(v) = self.results {
            config.results_path = Some(v);
        }
        if let Some(v) = self.long_results {
            config.long_results_path = Some(v);
        }
        if let Some(v) = self.chart {
            config.chart_path = Some(v);
        }
        if let Some(v) = self.aggregation {
            config.plot.aggregation = v.into();
        }
        config.verbose |= self.verbose;
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the full dataset × depth × repetition × method grid
    Run(RunArgs),

    /// Fit every available method on a whole dataset and report training accuracy
    Fit {
        #[command(flatten)]
        data: DataArgs,

        /// Dataset name
        #[arg(long, default_value = "bank")]
        dataset: String,

        /// Depth limit
        #[arg(long, default_value_t = 2)]
        depth: usize,

        /// Methods to fit, comma separated (default: all available)
        #[arg(long, value_delimiter = ',')]
        methods: Option<Vec<String>>,

        /// Verbose classifier logging
        #[arg(long)]
        verbose: bool,
    },

    /// Tune a method with k-fold grid search, then score it on a held-out split
    Search {
        #[command(flatten)]
        data: DataArgs,

        /// Dataset name
        #[arg(long, default_value = "occupancy")]
        dataset: String,

        /// Method to tune
        #[arg(long, default_value = "Optimal")]
        method: String,

        /// Parameter grid as JSON
        #[arg(long, default_value = r#"{"max_depth": [2, 3, 4]}"#)]
        grid: String,

        /// Scoring function
        #[arg(long, default_value = "accuracy")]
        scoring: String,

        /// Cross-validation folds
        #[arg(long, default_value_t = 5)]
        folds: usize,

        /// Held-out fraction (large on purpose: a small training set favors small trees)
        #[arg(long, default_value_t = 0.8)]
        test_fraction: f64,

        /// Seed for the split and the fold shuffle
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Fit the optimal tree, print it, and write it as a DOT graph
    Export {
        #[command(flatten)]
        data: DataArgs,

        /// Dataset name
        #[arg(long, default_value = "bank")]
        dataset: String,

        /// Depth limit
        #[arg(long, default_value_t = 3)]
        depth: usize,

        /// DOT output file
        #[arg(long, default_value = "tree.dot")]
        output: PathBuf,

        /// Class names for leaf labels, comma separated, in label order
        #[arg(long, value_delimiter = ',')]
        class_names: Option<Vec<String>>,
    },

    /// Render a chart from saved wide results
    Plot {
        /// Wide results (.parquet or .json)
        #[arg(long)]
        results: PathBuf,

        /// SVG chart output
        #[arg(long, default_value = "comparison.svg")]
        chart: PathBuf,

        /// How repetitions are drawn
        #[arg(long, value_enum, default_value = "mean-ci")]
        aggregation: AggregationArg,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => run(args),
        Command::Fit {
            data,
            dataset,
            depth,
            methods,
            verbose,
        } => fit(&data, &dataset, depth, methods.as_deref(), verbose),
        Command::Search {
            data,
            dataset,
            method,
            grid,
            scoring,
            folds,
            test_fraction,
            seed,
        } => {
            let grid: serde_json::Value =
                serde_json::from_str(&grid).context("--grid is not valid JSON")?;
            let options = SearchOptions {
                grid: ParamGrid::from_json(&grid)?,
                scoring: scoring.parse()?,
                folds,
                test_fraction,
                seed,
            };
            search(&data, &dataset, &method, options)
        }
        Command::Export {
            data,
            dataset,
            depth,
            output,
            class_names,
        } => export(&data, &dataset, depth, &output, class_names.as_deref()),
        Command::Plot {
            results,
            chart,
            aggregation,
        } => {
            let table = read_results(&results)?;
            let config = PlotConfig {
                aggregation: aggregation.into(),
                ..PlotConfig::default()
            };
            write_chart(&table, &config, &chart)
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config_path = args.config.clone();
    let mut config = BenchmarkConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    args.apply(&mut config);

    let spec = config.grid_spec()?;
    let methods = config.registry().detect(config.methods.as_deref())?;
    for skipped in methods.skipped() {
        eprintln!("Skipping {}: {}", skipped.method, skipped.reason);
    }

    let source = DirectorySource::new(&config.data_dir);
    let report = GridRunner::new(&source, &methods, spec)
        .run_with(|event| println!("{}", event.progress_line()))?;

    for failure in &report.dataset_failures {
        eprintln!("Dataset {} skipped: {}", failure.dataset, failure.reason);
    }
    if !report.table.failures().is_empty() {
        eprintln!("{} trial(s) failed", report.table.failures().len());
    }

    print_summary(&report.table);

    if report.table.is_empty() {
        warn!("no completed trials, nothing to write");
        return Ok(());
    }
    if let Some(path) = &config.results_path {
        write_wide(&report.table, path)?;
    }
    if let Some(path) = &config.long_results_path {
        write_long(&melt(&report.table, &Metric::ALL)?, path)?;
    }
    if let Some(path) = &config.chart_path {
        write_chart(&report.table, &config.plot, path)?;
    }
    info!(benchmark = report.record.benchmark_id(), "done");
    Ok(())
}

fn print_summary(table: &ResultTable) {
    let summary = table.summary();
    if summary.is_empty() {
        return;
    }
    println!();
    println!("{}", SummaryRow::table_header());
    for row in &summary {
        println!("{}", row.table_line());
    }
}

fn fit(
    data: &DataArgs,
    dataset: &str,
    depth: usize,
    methods: Option<&[String]>,
    verbose: bool,
) -> Result<()> {
    let dataset = DirectorySource::new(&data.data_dir).load(dataset)?;
    let selection = MethodRegistry::builtin().detect(methods)?;
    let params = TreeParams {
        verbose,
        ..TreeParams::with_depth(depth)
    };

    for factory in selection.factories() {
        let mut model = factory.build(&params);
        let start = Instant::now();
        model.fit(dataset.features(), dataset.labels())?;
        let elapsed = start.elapsed().as_secs_f64();
        let predicted = model.predict(dataset.features())?;
        println!(
            "{:15} accuracy: {:6.2}%  (fit {elapsed:.3}s)",
            factory.method(),
            accuracy(dataset.labels(), &predicted)?
        );
    }
    Ok(())
}

struct SearchOptions {
    grid: ParamGrid,
    scoring: Scoring,
    folds: usize,
    test_fraction: f64,
    seed: u64,
}

fn search(data: &DataArgs, dataset: &str, method: &str, options: SearchOptions) -> Result<()> {
    let dataset = DirectorySource::new(&data.data_dir).load(dataset)?;
    let split = SplitGenerator::new(options.test_fraction)?.split_dataset(&dataset, options.seed)?;
    let (train, test) = (split.train(&dataset), split.test(&dataset));

    let requested = [method.to_string()];
    let selection = MethodRegistry::builtin().detect(Some(&requested[..]))?;
    let factory = selection.require(method)?;

    let start = Instant::now();
    let fitted = GridSearch::new(factory, options.grid)
        .folds(options.folds)
        .seed(options.seed)
        .scoring(options.scoring)
        .fit(&train.features, &train.labels)?;
    let elapsed = start.elapsed().as_secs_f64();

    for candidate in fitted.candidates() {
        println!(
            "max_depth={:<3} max_thresholds={:<8} mean {}: {:6.2}",
            candidate.params.max_depth,
            candidate
                .params
                .max_thresholds
                .map_or_else(|| "all".to_string(), |n| n.to_string()),
            options.scoring,
            candidate.mean_score
        );
    }
    println!();
    println!("Grid search finished in {elapsed:.3} seconds");
    let best = fitted.best_params();
    println!(
        "Best params: max_depth={} max_thresholds={:?}",
        best.max_depth, best.max_thresholds
    );
    println!(
        "Test {}: {:.2}%",
        options.scoring,
        fitted.score(&test.features, &test.labels)?
    );
    Ok(())
}

fn export(
    data: &DataArgs,
    dataset: &str,
    depth: usize,
    output: &Path,
    class_names: Option<&[String]>,
) -> Result<()> {
    let dataset = DirectorySource::new(&data.data_dir).load(dataset)?;
    let mut model = OptimalTree::exact(depth);
    model.fit(dataset.features(), dataset.labels())?;
    let Some(tree) = model.tree() else {
        bail!("optimal tree was not fitted");
    };

    println!("{tree}");
    if let Some(names) = class_names {
        if names.len() < tree.classes().len() {
            bail!(
                "{} class names given for {} classes",
                names.len(),
                tree.classes().len()
            );
        }
    }
    create_parent(output)?;
    fs::write(output, tree.export_dot(class_names))
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(path = %output.display(), depth = tree.depth(), leaves = tree.leaf_count(), "tree exported");
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn write_wide(table: &ResultTable, path: &Path) -> Result<()> {
    if is_json(path) {
        create_parent(path)?;
        fs::write(path, serde_json::to_string_pretty(table.results())?)?;
    } else {
        ResultsStore::new(vec![table.to_record_batch()?]).write_parquet(path)?;
    }
    info!(path = %path.display(), rows = table.len(), "wide results written");
    Ok(())
}

fn write_long(long: &LongTable, path: &Path) -> Result<()> {
    if is_json(path) {
        create_parent(path)?;
        fs::write(path, serde_json::to_string_pretty(long.records())?)?;
    } else {
        ResultsStore::new(vec![long.to_record_batch()?]).write_parquet(path)?;
    }
    info!(path = %path.display(), rows = long.len(), "long results written");
    Ok(())
}

fn read_results(path: &Path) -> Result<ResultTable> {
    if is_json(path) {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let rows: Vec<TrialResult> = serde_json::from_str(&contents)?;
        let mut table = ResultTable::new();
        rows.into_iter().for_each(|row| table.push(row));
        Ok(table)
    } else {
        Ok(ResultsStore::load_parquet(path)?.to_result_table()?)
    }
}

fn write_chart(table: &ResultTable, config: &PlotConfig, path: &Path) -> Result<()> {
    let long = melt(table, &Metric::ALL)?;
    let grid = FacetGrid::build(&long, config)?;
    create_parent(path)?;
    fs::write(path, render_svg(&grid, config))
        .with_context(|| format!("failed to write chart {}", path.display()))?;
    info!(
        path = %path.display(),
        rows = grid.rows().len(),
        columns = grid.columns().len(),
        "chart written"
    );
    Ok(())
}
