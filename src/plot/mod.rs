//! Faceted comparison charts
//!
//! [`FacetGrid::build`] turns a [`LongTable`] into a grid of panels, one row
//! per metric and one column per dataset, with a line per method and depth
//! on the x axis. The layout is plain data (serializable, testable);
//! [`render_svg`] draws it.
//!
//! Layout rules:
//! - rows follow [`PlotConfig::row_order`], skipping metrics with no data;
//! - columns follow first appearance of each dataset;
//! - only the top row carries titles (the dataset name);
//! - only the first column carries y labels, with units;
//! - exactly one panel, top row and last column, carries the legend;
//! - the x range is shared when `share_x` is set, y ranges are per panel
//!   unless `share_y` is set.

mod svg;

pub use svg::render_svg;

use crate::reshape::{LongTable, Metric};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// z-value of the two-sided 95% normal interval
const Z_95: f64 = 1.96;

/// Seaborn's "colorblind" palette
pub const COLORBLIND: [&str; 10] = [
    "#0173B2", "#DE8F05", "#029E73", "#D55E00", "#CC78BC", "#CA9161", "#FBAFE4", "#949494",
    "#ECE133", "#56B4E9",
];

/// How repetitions are drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    /// Mean per depth with a 95% confidence band
    #[default]
    MeanWithCi,
    /// One line per repetition
    Individual,
}

/// Chart style and layout options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Generic font family
    pub font_family: String,
    /// Preferred serif face
    pub serif_font: String,
    /// Base font size in points
    pub font_size: f64,
    /// Tick label size in points
    pub tick_label_size: f64,
    /// Axis label size in points
    pub axis_label_size: f64,
    /// Legend label size in points
    pub legend_label_size: f64,
    /// Draw grid lines
    pub grid: bool,
    /// Series colors, by method order
    pub palette: Vec<String>,
    /// One x range for all panels
    pub share_x: bool,
    /// One y range for all panels
    pub share_y: bool,
    /// Metric of each row, top to bottom
    pub row_order: Vec<Metric>,
    /// Panel height in inches
    pub panel_height: f64,
    /// Panel width / height
    pub aspect: f64,
    /// Repetition handling
    pub aggregation: Aggregation,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            font_family: "serif".to_string(),
            serif_font: "Times New Roman".to_string(),
            font_size: 10.0,
            tick_label_size: 6.0,
            axis_label_size: 8.0,
            legend_label_size: 8.0,
            grid: true,
            palette: COLORBLIND.iter().map(ToString::to_string).collect(),
            share_x: true,
            share_y: false,
            row_order: vec![Metric::TrainAccuracy, Metric::TestAccuracy, Metric::Runtime],
            panel_height: 1.6,
            aspect: 1.5,
            aggregation: Aggregation::MeanWithCi,
        }
    }
}

impl PlotConfig {
    /// Check sizes, palette and row order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.palette.is_empty() {
            return Err(Error::InvalidInput("plot palette is empty".to_string()));
        }
        if self.row_order.is_empty() {
            return Err(Error::InvalidInput("plot row order is empty".to_string()));
        }
        for (i, m) in self.row_order.iter().enumerate() {
            if self.row_order[..i].contains(m) {
                return Err(Error::InvalidInput(format!("metric '{m}' appears twice in row order")));
            }
        }
        let sizes = [
            self.font_size,
            self.tick_label_size,
            self.axis_label_size,
            self.legend_label_size,
            self.panel_height,
            self.aspect,
        ];
        if sizes.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(Error::InvalidInput("plot sizes must be positive".to_string()));
        }
        Ok(())
    }

    /// Panel width in inches
    #[must_use]
    pub fn panel_width(&self) -> f64 {
        self.panel_height * self.aspect
    }

    /// Color of the `index`-th method, cycling through the palette
    #[must_use]
    pub fn color(&self, index: usize) -> &str {
        if self.palette.is_empty() {
            return "#000000";
        }
        &self.palette[index % self.palette.len()]
    }
}

/// One plotted value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Depth limit (x)
    pub depth: usize,
    /// Mean or single value (y)
    pub value: f64,
    /// Confidence band, when aggregated over more than one run
    pub band: Option<(f64, f64)>,
}

/// One line in a panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Method name
    pub method: String,
    /// Index into the grid's method list (and palette)
    pub method_index: usize,
    /// Repetition, for [`Aggregation::Individual`]
    pub run: Option<u32>,
    /// Points ordered by depth
    pub points: Vec<Point>,
}

/// One cell of the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// Row index (metric)
    pub row: usize,
    /// Column index (dataset)
    pub col: usize,
    /// Metric on the y axis
    pub metric: Metric,
    /// Dataset shown
    pub dataset: String,
    /// Title, top row only
    pub title: Option<String>,
    /// Y label, first column only
    pub y_label: Option<String>,
    /// X label, bottom row only
    pub x_label: Option<String>,
    /// Whether this panel draws the legend
    pub legend: bool,
    /// X axis extent
    pub x_range: (f64, f64),
    /// Y axis extent
    pub y_range: (f64, f64),
    /// Lines, in method order
    pub series: Vec<Series>,
}

/// Panel grid derived from a long-form table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetGrid {
    rows: Vec<Metric>,
    columns: Vec<String>,
    methods: Vec<String>,
    x_ticks: Vec<usize>,
    panels: Vec<Panel>,
}

impl FacetGrid {
    /// Lay out `table` according to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an invalid config or when no
    /// record matches any configured row.
    pub fn build(table: &LongTable, config: &PlotConfig) -> Result<Self> {
        config.validate()?;

        let rows: Vec<Metric> = config
            .row_order
            .iter()
            .copied()
            .filter(|&m| table.metric(m).next().is_some())
            .collect();
        if rows.is_empty() {
            return Err(Error::InvalidInput(
                "no records for any configured plot row".to_string(),
            ));
        }
        let plotted = &rows;
        let records = || {
            table
                .records()
                .iter()
                .filter(move |r| plotted.contains(&r.variable))
        };

        let columns: Vec<String> = first_seen(records().map(|r| r.dataset.as_str()));
        let methods: Vec<String> = first_seen(records().map(|r| r.method.as_str()));
        let mut x_ticks: Vec<usize> = records().map(|r| r.depth).collect();
        x_ticks.sort_unstable();
        x_ticks.dedup();

        let last_row = rows.len() - 1;
        let last_col = columns.len() - 1;
        let mut panels = Vec::with_capacity(rows.len() * columns.len());

        for (row, &metric) in rows.iter().enumerate() {
            for (col, dataset) in columns.iter().enumerate() {
                let series = methods
                    .iter()
                    .enumerate()
                    .flat_map(|(method_index, method)| {
                        let values: Vec<(usize, u32, f64)> = table
                            .metric(metric)
                            .filter(|r| &r.dataset == dataset && &r.method == method)
                            .map(|r| (r.depth, r.run, r.value))
                            .collect();
                        build_series(method, method_index, &values, config.aggregation)
                    })
                    .collect::<Vec<_>>();

                panels.push(Panel {
                    row,
                    col,
                    metric,
                    dataset: dataset.clone(),
                    title: (row == 0).then(|| dataset.clone()),
                    y_label: (col == 0).then(|| metric.axis_label().to_string()),
                    x_label: (row == last_row).then(|| "Depth".to_string()),
                    legend: row == 0 && col == last_col,
                    x_range: (0.0, 0.0),
                    y_range: (0.0, 0.0),
                    series,
                });
            }
        }

        if config.share_x {
            let range = padded_range(panels.iter().flat_map(xs));
            panels.iter_mut().for_each(|p| p.x_range = range);
        } else {
            for panel in &mut panels {
                panel.x_range = padded_range(xs(panel));
            }
        }
        if config.share_y {
            let range = padded_range(panels.iter().flat_map(ys));
            panels.iter_mut().for_each(|p| p.y_range = range);
        } else {
            for panel in &mut panels {
                panel.y_range = padded_range(ys(panel));
            }
        }

        Ok(Self {
            rows,
            columns,
            methods,
            x_ticks,
            panels,
        })
    }

    /// Metric of each row
    #[must_use]
    pub fn rows(&self) -> &[Metric] {
        &self.rows
    }

    /// Dataset of each column
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Methods in legend order
    #[must_use]
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Integer depth ticks
    #[must_use]
    pub fn x_ticks(&self) -> &[usize] {
        &self.x_ticks
    }

    /// Panels in row-major order
    #[must_use]
    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    /// Panel at `(row, col)`
    #[must_use]
    pub fn panel(&self, row: usize, col: usize) -> Option<&Panel> {
        if row >= self.rows.len() || col >= self.columns.len() {
            return None;
        }
        self.panels.get(row * self.columns.len() + col)
    }

    /// The single panel that draws the legend
    #[must_use]
    pub fn legend_panel(&self) -> Option<&Panel> {
        self.panels.iter().find(|p| p.legend)
    }
}

fn build_series(
    method: &str,
    method_index: usize,
    values: &[(usize, u32, f64)],
    aggregation: Aggregation,
) -> Vec<Series> {
    if values.is_empty() {
        return Vec::new();
    }
    match aggregation {
        Aggregation::MeanWithCi => {
            let mut by_depth: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
            for &(depth, _, value) in values {
                by_depth.entry(depth).or_default().push(value);
            }
            let points = by_depth
                .into_iter()
                .map(|(depth, vs)| mean_with_ci(depth, &vs))
                .collect();
            vec![Series {
                method: method.to_string(),
                method_index,
                run: None,
                points,
            }]
        }
        Aggregation::Individual => {
            let mut by_run: BTreeMap<u32, BTreeMap<usize, f64>> = BTreeMap::new();
            for &(depth, run, value) in values {
                by_run.entry(run).or_default().insert(depth, value);
            }
            by_run
                .into_iter()
                .map(|(run, points)| Series {
                    method: method.to_string(),
                    method_index,
                    run: Some(run),
                    points: points
                        .into_iter()
                        .map(|(depth, value)| Point {
                            depth,
                            value,
                            band: None,
                        })
                        .collect(),
                })
                .collect()
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_with_ci(depth: usize, values: &[f64]) -> Point {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let band = (values.len() > 1).then(|| {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let half = Z_95 * var.sqrt() / n.sqrt();
        (mean - half, mean + half)
    });
    Point {
        depth,
        value: mean,
        band,
    }
}

#[allow(clippy::cast_precision_loss)]
fn xs(panel: &Panel) -> impl Iterator<Item = f64> + '_ {
    panel
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.depth as f64))
}

fn ys(panel: &Panel) -> impl Iterator<Item = f64> + '_ {
    panel.series.iter().flat_map(|s| {
        s.points.iter().flat_map(|p| {
            let (lo, hi) = p.band.unwrap_or((p.value, p.value));
            [p.value, lo, hi]
        })
    })
}

/// Min/max with 5% padding; a degenerate range is widened by one unit.
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 0.5, hi + 0.5);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn first_seen<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for item in items {
        if !seen.iter().any(|s| s == item) {
            seen.push(item.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ResultTable, TrialResult, TrialSpec};
    use crate::reshape::melt;

    fn long() -> LongTable {
        let mut table = ResultTable::new();
        for dataset in ["Bank", "Wilt"] {
            for depth in 2..=3 {
                for run in 1..=2_u32 {
                    for method in ["Optimal", "CART"] {
                        let spec = TrialSpec {
                            dataset: dataset.to_string(),
                            method: method.to_string(),
                            depth,
                            run,
                        };
                        let acc = 80.0 + f64::from(run);
                        table.push(TrialResult::new(&spec, 0.01 * f64::from(run), acc, acc - 5.0));
                    }
                }
            }
        }
        melt(&table, &Metric::ALL).unwrap()
    }

    #[test]
    fn test_grid_shape_and_order() {
        let grid = FacetGrid::build(&long(), &PlotConfig::default()).unwrap();
        assert_eq!(
            grid.rows(),
            &[Metric::TrainAccuracy, Metric::TestAccuracy, Metric::Runtime]
        );
        assert_eq!(grid.columns(), &["Bank".to_string(), "Wilt".to_string()]);
        assert_eq!(grid.methods(), &["Optimal".to_string(), "CART".to_string()]);
        assert_eq!(grid.panels().len(), 6);
        assert_eq!(grid.x_ticks(), &[2, 3]);
    }

    #[test]
    fn test_single_legend_top_right() {
        let grid = FacetGrid::build(&long(), &PlotConfig::default()).unwrap();
        assert_eq!(grid.panels().iter().filter(|p| p.legend).count(), 1);
        let legend = grid.legend_panel().unwrap();
        assert_eq!((legend.row, legend.col), (0, 1));
    }

    #[test]
    fn test_titles_and_labels() {
        let grid = FacetGrid::build(&long(), &PlotConfig::default()).unwrap();
        assert_eq!(grid.panel(0, 1).unwrap().title.as_deref(), Some("Wilt"));
        assert!(grid.panel(1, 1).unwrap().title.is_none());
        assert_eq!(grid.panel(2, 0).unwrap().y_label.as_deref(), Some("Runtime (s)"));
        assert_eq!(grid.panel(1, 0).unwrap().y_label.as_deref(), Some("Test Accuracy (%)"));
        assert!(grid.panel(0, 1).unwrap().y_label.is_none());
        assert!(grid.panel(2, 1).unwrap().x_label.is_some());
        assert!(grid.panel(0, 0).unwrap().x_label.is_none());
        assert!(grid.panel(3, 0).is_none());
    }

    #[test]
    fn test_mean_with_ci() {
        let grid = FacetGrid::build(&long(), &PlotConfig::default()).unwrap();
        let panel = grid.panel(0, 0).unwrap();
        assert_eq!(panel.series.len(), 2);
        let point = panel.series[0].points[0];
        assert_eq!(point.depth, 2);
        assert!((point.value - 81.5).abs() < 1e-12);
        let (lo, hi) = point.band.unwrap();
        let half = 1.96 * 0.5_f64.sqrt() / 2.0_f64.sqrt();
        assert!((lo - (81.5 - half)).abs() < 1e-9);
        assert!((hi - (81.5 + half)).abs() < 1e-9);
    }

    #[test]
    fn test_individual_series_per_run() {
        let config = PlotConfig {
            aggregation: Aggregation::Individual,
            ..PlotConfig::default()
        };
        let grid = FacetGrid::build(&long(), &config).unwrap();
        let panel = grid.panel(0, 0).unwrap();
        assert_eq!(panel.series.len(), 4);
        assert!(panel.series.iter().all(|s| s.run.is_some() && s.points.len() == 2));
    }

    #[test]
    fn test_independent_y_shared_x() {
        let grid = FacetGrid::build(&long(), &PlotConfig::default()).unwrap();
        let acc = grid.panel(0, 0).unwrap();
        let rt = grid.panel(2, 0).unwrap();
        assert!(acc.y_range.0 > 10.0);
        assert!(rt.y_range.1 < 1.0);
        assert!(grid.panels().iter().all(|p| p.x_range == acc.x_range));
    }

    #[test]
    fn test_row_order_restricts_rows() {
        let config = PlotConfig {
            row_order: vec![Metric::Runtime],
            ..PlotConfig::default()
        };
        let grid = FacetGrid::build(&long(), &config).unwrap();
        assert_eq!(grid.rows(), &[Metric::Runtime]);
        assert_eq!(grid.panels().len(), 2);
        assert!(grid.panel(0, 0).unwrap().x_label.is_some());
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(FacetGrid::build(&LongTable::default(), &PlotConfig::default()).is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(PlotConfig::default().validate().is_ok());
        let config = PlotConfig {
            row_order: vec![Metric::Runtime, Metric::Runtime],
            ..PlotConfig::default()
        };
        assert!(config.validate().is_err());
        let config = PlotConfig {
            aspect: 0.0,
            ..PlotConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_palette_cycles() {
        let config = PlotConfig::default();
        assert_eq!(config.color(0), COLORBLIND[0]);
        assert_eq!(config.color(10), COLORBLIND[0]);
    }
}
