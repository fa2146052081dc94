//! Terminal charts using braille graphics
//!
//! Q-Q plots and interaction plots are drawn on a drawille canvas;
//! histograms use block characters.

use drawille::Canvas;

use crate::core::describe::{GroupStats, GroupStatsTable, Histogram};
use crate::core::diagnostics::QqPoints;

/// Default canvas size in braille pixels (2x4 pixels per character)
pub const CHART_WIDTH: u32 = 96;
pub const CHART_HEIGHT: u32 = 48;

/// Width of the longest histogram bar in characters
pub const BAR_MAX_WIDTH: usize = 50;

/// Map `v` from `[lo, hi]` onto `[0, pixels - 1]`
fn scale(v: f64, lo: f64, hi: f64, pixels: u32) -> u32 {
    let span = hi - lo;
    let t = if span > 0.0 { (v - lo) / span } else { 0.5 };
    (t.clamp(0.0, 1.0) * (pixels - 1) as f64).round() as u32
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Render a histogram as horizontal bars, one row per bin
///
/// # Example Output
/// ```text
///     412.0 -    448.0 │████████████                     12
///     448.0 -    484.0 │██████████████████████████       26
/// ```
pub fn render_histogram(hist: &Histogram) -> String {
    if hist.counts.is_empty() {
        return "  (no data)".to_string();
    }
    let max_count = hist.max_count().max(1);
    let total: usize = hist.counts.iter().sum();

    let mut lines = vec![format!(
        "  {} ({} values, {} bins)",
        hist.column,
        total,
        hist.counts.len()
    )];
    for (i, &count) in hist.counts.iter().enumerate() {
        let width = count * BAR_MAX_WIDTH / max_count;
        lines.push(format!(
            "  {:>10.3} - {:>10.3} │{:<bar$} {}",
            hist.edges[i],
            hist.edges[i + 1],
            "█".repeat(width),
            count,
            bar = BAR_MAX_WIDTH
        ));
    }
    lines.join("\n")
}

/// Render a normal Q-Q plot with its least-squares reference line
pub fn render_qq(qq: &QqPoints, width: u32, height: u32) -> String {
    let mut canvas = Canvas::new(width, height);

    let (Some((x_lo, x_hi)), Some((y_lo, y_hi))) = (
        bounds(qq.theoretical.iter().copied()),
        bounds(qq.sample.iter().copied()),
    ) else {
        return "  (no data)".to_string();
    };

    // Reference line, clipped to the sample range
    let steps = width * 2;
    for i in 0..=steps {
        let x = x_lo + (x_hi - x_lo) * i as f64 / steps as f64;
        let y = qq.intercept + qq.slope * x;
        if y >= y_lo && y <= y_hi {
            canvas.set(
                scale(x, x_lo, x_hi, width),
                height - 1 - scale(y, y_lo, y_hi, height),
            );
        }
    }

    for (&x, &y) in qq.theoretical.iter().zip(&qq.sample) {
        let px = scale(x, x_lo, x_hi, width);
        let py = height - 1 - scale(y, y_lo, y_hi, height);
        canvas.set(px, py);
        canvas.set(px.saturating_add(1).min(width - 1), py);
    }

    let mut output = canvas.frame();
    output.push_str(&format!(
        "\n  theoretical [{:.2}, {:.2}]  sample [{:.3}, {:.3}]  r = {:.4}",
        x_lo, x_hi, y_lo, y_hi, qq.r
    ));
    output
}

/// Render an interaction plot: one line per level of the first grouping
/// column, across the levels of the second
///
/// Each point is the cell mean; a vertical tick spans mean ± SEM.
pub fn render_interaction(cells: &GroupStatsTable, width: u32, height: u32) -> String {
    if cells.group_cols.len() != 2 || cells.groups.is_empty() {
        return "  (no data)".to_string();
    }

    let mut lines_of: Vec<String> = Vec::new();
    let mut x_levels: Vec<String> = Vec::new();
    for g in &cells.groups {
        if !lines_of.contains(&g.key[0]) {
            lines_of.push(g.key[0].clone());
        }
        if !x_levels.contains(&g.key[1]) {
            x_levels.push(g.key[1].clone());
        }
    }

    let extent = |g: &GroupStats| {
        let sem = if g.sem.is_finite() { g.sem } else { 0.0 };
        [g.mean - sem, g.mean + sem]
    };
    let Some((y_lo, y_hi)) = bounds(cells.groups.iter().flat_map(extent)) else {
        return "  (no data)".to_string();
    };

    let x_pos = |level: &str| -> u32 {
        let idx = x_levels.iter().position(|l| l == level).unwrap_or(0);
        if x_levels.len() < 2 {
            width / 2
        } else {
            4 + (idx as u32) * (width - 9) / (x_levels.len() as u32 - 1)
        }
    };
    let y_pos = |v: f64| height - 1 - scale(v, y_lo, y_hi, height);

    let mut canvas = Canvas::new(width, height);
    let mut legend = Vec::new();
    for line in &lines_of {
        let points: Vec<&GroupStats> =
            cells.groups.iter().filter(|g| &g.key[0] == line).collect();
        for pair in points.windows(2) {
            canvas.line(
                x_pos(pair[0].key[1].as_str()),
                y_pos(pair[0].mean),
                x_pos(pair[1].key[1].as_str()),
                y_pos(pair[1].mean),
            );
        }
        for p in &points {
            let [lo, hi] = extent(p);
            let x = x_pos(p.key[1].as_str());
            canvas.line(x, y_pos(lo), x, y_pos(hi));
            canvas.line(x.saturating_sub(1), y_pos(lo), x + 1, y_pos(lo));
            canvas.line(x.saturating_sub(1), y_pos(hi), x + 1, y_pos(hi));
        }
        let means: Vec<String> = points
            .iter()
            .map(|p| format!("{} {:.3}", p.key[1], p.mean))
            .collect();
        legend.push(format!(
            "  {}={}: {}",
            cells.group_cols[0],
            truncate_str(line, 12),
            means.join(" → ")
        ));
    }

    let mut output = canvas.frame();
    output.push_str(&format!(
        "\n  x: {} ({})   y: mean {} ± SEM [{:.3}, {:.3}]\n",
        cells.group_cols[1],
        x_levels.join(", "),
        cells.value_col,
        y_lo,
        y_hi
    ));
    output.push_str(&legend.join("\n"));
    output
}

/// Truncate string to max length with ellipsis
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 2 {
        s.chars().take(max_len).collect()
    } else {
        format!("{}…", s.chars().take(max_len - 1).collect::<String>())
    }
}
