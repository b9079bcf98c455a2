//! SVG rendering of a [`FacetGrid`]
//!
//! Units are points (1/72 in), so font sizes from [`PlotConfig`] are used
//! as-is.

use super::{FacetGrid, Panel, PlotConfig, Series};

const PT_PER_INCH: f64 = 72.0;
const MARGIN_LEFT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 24.0;
const MARGIN_TOP: f64 = 14.0;
const MARGIN_RIGHT: f64 = 6.0;
const Y_TICKS: usize = 4;

/// Draw the whole grid as a standalone SVG document.
#[must_use]
pub fn render_svg(grid: &FacetGrid, config: &PlotConfig) -> String {
    let cell_w = config.panel_width() * PT_PER_INCH;
    let cell_h = config.panel_height * PT_PER_INCH;
    #[allow(clippy::cast_precision_loss)]
    let (width, height) = (
        cell_w * grid.columns().len() as f64,
        cell_h * grid.rows().len() as f64,
    );

    let mut svg = Svg::default();
    svg.push(format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.1}pt" height="{height:.1}pt" viewBox="0 0 {width:.1} {height:.1}" font-family="{}, {}" font-size="{}">"#,
        escape(&config.serif_font),
        escape(&config.font_family),
        config.font_size
    ));
    svg.push(format!(
        r#"<rect width="{width:.1}" height="{height:.1}" fill="white"/>"#
    ));

    for panel in grid.panels() {
        #[allow(clippy::cast_precision_loss)]
        let origin = (panel.col as f64 * cell_w, panel.row as f64 * cell_h);
        let frame = Frame {
            left: origin.0 + MARGIN_LEFT,
            top: origin.1 + MARGIN_TOP,
            width: cell_w - MARGIN_LEFT - MARGIN_RIGHT,
            height: cell_h - MARGIN_TOP - MARGIN_BOTTOM,
            x_range: panel.x_range,
            y_range: panel.y_range,
        };
        draw_panel(&mut svg, grid, panel, &frame, config);
        if panel.legend {
            draw_legend(&mut svg, grid, &frame, config);
        }
    }

    svg.push("</svg>".to_string());
    svg.finish()
}

#[derive(Default)]
struct Svg {
    out: String,
}

impl Svg {
    fn push(&mut self, element: String) {
        self.out.push_str(&element);
        self.out.push('\n');
    }

    fn finish(self) -> String {
        self.out
    }
}

struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl Frame {
    fn x(&self, value: f64) -> f64 {
        let (lo, hi) = self.x_range;
        self.left + (value - lo) / (hi - lo) * self.width
    }

    fn y(&self, value: f64) -> f64 {
        let (lo, hi) = self.y_range;
        self.top + self.height - (value - lo) / (hi - lo) * self.height
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

fn draw_panel(svg: &mut Svg, grid: &FacetGrid, panel: &Panel, frame: &Frame, config: &PlotConfig) {
    let ticks = nice_ticks(frame.y_range);

    if config.grid {
        for &t in &ticks {
            let y = frame.y(t);
            svg.push(format!(
                r##"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="#e0e0e0" stroke-width="0.5"/>"##,
                frame.left,
                frame.left + frame.width
            ));
        }
    }
    svg.push(format!(
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="black" stroke-width="0.6"/>"#,
        frame.left, frame.top, frame.width, frame.height
    ));

    for &t in &ticks {
        svg.push(format!(
            r#"<text x="{:.2}" y="{:.2}" font-size="{}" text-anchor="end">{}</text>"#,
            frame.left - 2.0,
            frame.y(t) + config.tick_label_size / 3.0,
            config.tick_label_size,
            format_tick(t, &ticks)
        ));
    }
    for &depth in grid.x_ticks() {
        #[allow(clippy::cast_precision_loss)]
        let x = frame.x(depth as f64);
        svg.push(format!(
            r#"<text x="{x:.2}" y="{:.2}" font-size="{}" text-anchor="middle">{depth}</text>"#,
            frame.bottom() + config.tick_label_size + 2.0,
            config.tick_label_size
        ));
    }

    if let Some(title) = &panel.title {
        svg.push(format!(
            r#"<text x="{:.2}" y="{:.2}" font-size="{}" text-anchor="middle">{}</text>"#,
            frame.left + frame.width / 2.0,
            frame.top - 4.0,
            config.axis_label_size,
            escape(title)
        ));
    }
    if let Some(label) = &panel.y_label {
        let (x, y) = (frame.left - MARGIN_LEFT + config.axis_label_size, frame.top + frame.height / 2.0);
        svg.push(format!(
            r#"<text x="{x:.2}" y="{y:.2}" font-size="{}" text-anchor="middle" transform="rotate(-90 {x:.2} {y:.2})">{}</text>"#,
            config.axis_label_size,
            escape(label)
        ));
    }
    if let Some(label) = &panel.x_label {
        svg.push(format!(
            r#"<text x="{:.2}" y="{:.2}" font-size="{}" text-anchor="middle">{}</text>"#,
            frame.left + frame.width / 2.0,
            frame.bottom() + MARGIN_BOTTOM - 2.0,
            config.axis_label_size,
            escape(label)
        ));
    }

    for series in &panel.series {
        draw_series(svg, series, frame, config);
    }
}

fn draw_series(svg: &mut Svg, series: &Series, frame: &Frame, config: &PlotConfig) {
    let color = escape(config.color(series.method_index));
    #[allow(clippy::cast_precision_loss)]
    let at = |depth: usize, value: f64| format!("{:.2},{:.2}", frame.x(depth as f64), frame.y(value));

    let upper: Vec<String> = series
        .points
        .iter()
        .filter_map(|p| p.band.map(|(_, hi)| at(p.depth, hi)))
        .collect();
    if upper.len() == series.points.len() && upper.len() > 1 {
        let lower = series
            .points
            .iter()
            .rev()
            .filter_map(|p| p.band.map(|(lo, _)| at(p.depth, lo)));
        let outline: Vec<String> = upper.iter().cloned().chain(lower).collect();
        svg.push(format!(
            r#"<polygon points="{}" fill="{color}" fill-opacity="0.2" stroke="none"/>"#,
            outline.join(" ")
        ));
    }

    let line: Vec<String> = series.points.iter().map(|p| at(p.depth, p.value)).collect();
    let opacity = if series.run.is_some() { 0.5 } else { 1.0 };
    svg.push(format!(
        r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="1.2" stroke-opacity="{opacity}"/>"#,
        line.join(" ")
    ));
}

fn draw_legend(svg: &mut Svg, grid: &FacetGrid, frame: &Frame, config: &PlotConfig) {
    let line_h = config.legend_label_size + 2.0;
    let longest = grid.methods().iter().map(|m| m.chars().count()).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let box_w = 18.0 + longest as f64 * config.legend_label_size * 0.55;
    #[allow(clippy::cast_precision_loss)]
    let box_h = line_h * grid.methods().len() as f64 + 4.0;
    let left = frame.left + frame.width - box_w - 3.0;
    let top = frame.top + 3.0;

    svg.push(format!(
        r##"<g class="legend"><rect x="{left:.2}" y="{top:.2}" width="{box_w:.2}" height="{box_h:.2}" fill="white" fill-opacity="0.8" stroke="#cccccc" stroke-width="0.5"/>"##
    ));
    for (i, method) in grid.methods().iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let y = top + 2.0 + line_h * (i as f64 + 0.5);
        svg.push(format!(
            r#"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="{}" stroke-width="1.2"/>"#,
            left + 3.0,
            left + 13.0,
            escape(config.color(i))
        ));
        svg.push(format!(
            r#"<text x="{:.2}" y="{:.2}" font-size="{}">{}</text>"#,
            left + 16.0,
            y + config.legend_label_size / 3.0,
            config.legend_label_size,
            escape(method)
        ));
    }
    svg.push("</g>".to_string());
}

/// Round tick positions covering `range`, step 1, 2 or 5 times a power of ten.
fn nice_ticks((lo, hi): (f64, f64)) -> Vec<f64> {
    if !(lo.is_finite() && hi.is_finite() && hi > lo) {
        return Vec::new();
    }
    #[allow(clippy::cast_precision_loss)]
    let raw = (hi - lo) / Y_TICKS as f64;
    let magnitude = 10_f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw)
        .unwrap_or(10.0 * magnitude);

    let mut ticks = Vec::new();
    let mut t = (lo / step).ceil() * step;
    while t <= hi + step * 1e-9 {
        ticks.push(t);
        t += step;
    }
    ticks
}

fn format_tick(value: f64, ticks: &[f64]) -> String {
    let step = match ticks {
        [a, b, ..] => (b - a).abs(),
        _ => 1.0,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let decimals = if step >= 1.0 {
        0
    } else {
        (-step.log10().floor()) as usize
    };
    format!("{value:.decimals$}")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
