//! Report rendering
//!
//! Renderers turn a [`Report`] into text. They only read the plain data
//! produced by the pipeline and never run statistics themselves.

pub mod json;
pub mod markdown;
pub mod terminal;
pub mod viz;

use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};
use thiserror::Error;

use crate::core::anova::{AnovaRow, AnovaTable};
use crate::core::pipeline::{Check, DatasetAnalysis, DatasetKind, Report};

pub use json::JsonRenderer;
pub use markdown::MarkdownRenderer;
pub use terminal::TerminalRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Formatting failed: {0}")]
    Fmt(#[from] std::fmt::Error),
}

/// Which tabs of the report to render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    All,
    Overview,
    Interaction,
    Dataset(DatasetKind),
}

impl View {
    pub fn shows_overview(self) -> bool {
        matches!(self, View::All | View::Overview)
    }

    pub fn shows_interaction(self) -> bool {
        matches!(self, View::All | View::Interaction)
    }

    pub fn shows_dataset(self, kind: DatasetKind) -> bool {
        match self {
            View::All => true,
            View::Dataset(k) => k == kind,
            _ => false,
        }
    }
}

/// Turns reports into text
pub trait Renderer {
    /// Render the selected tabs of a full report
    fn render(&self, report: &Report, view: View) -> Result<String, RenderError>;

    /// Render the analysis of a single dataset
    fn render_analysis(&self, analysis: &DatasetAnalysis, alpha: f64)
        -> Result<String, RenderError>;
}

/// Border style of rendered tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStyle {
    Rounded,
    Markdown,
}

/// Lay out rows (header first) as a table; columns after the first are
/// right-aligned
pub fn build_table<R>(records: Vec<R>, style: TableStyle) -> String
where
    R: IntoIterator<Item = String>,
{
    let mut builder = Builder::default();
    for record in records {
        builder.push_record(record);
    }
    let mut table = builder.build();
    match style {
        TableStyle::Rounded => table.with(Style::rounded()),
        TableStyle::Markdown => table.with(Style::markdown()),
    };
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

/// Column headings of ANOVA tables, Minitab style
pub const ANOVA_HEADERS: [&str; 6] = ["Source", "DF", "Adj SS", "Adj MS", "F-Value", "P-Value"];

/// Format a float, showing `n/a` for NaN
pub fn fmt_num(x: f64, precision: usize) -> String {
    if x.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.*}", precision, x)
    }
}

/// Format a p-value to four decimals
pub fn fmt_p(p: f64) -> String {
    if p.is_nan() {
        "n/a".to_string()
    } else if p < 0.0001 {
        "<0.0001".to_string()
    } else {
        format!("{:.4}", p)
    }
}

/// One ANOVA row as display cells; error rows leave F and P blank
pub fn anova_cells(row: &AnovaRow) -> [String; 6] {
    [
        row.source.clone(),
        row.df.to_string(),
        fmt_num(row.ss, 3),
        fmt_num(row.ms, 3),
        row.f.map(|f| fmt_num(f, 3)).unwrap_or_default(),
        row.p.map(fmt_p).unwrap_or_default(),
    ]
}

/// `[header, rows...]` of an ANOVA table
pub fn anova_records(table: &AnovaTable) -> Vec<[String; 6]> {
    let mut records = vec![ANOVA_HEADERS.map(str::to_string)];
    records.extend(table.rows.iter().map(anova_cells));
    records
}

/// Sentence stating whether the interaction term is significant
pub fn interaction_message(analysis: &DatasetAnalysis) -> String {
    if analysis.interaction_significant {
        format!(
            "Significant interaction confirmed (p = {})",
            fmt_p(analysis.interaction_p)
        )
    } else {
        format!(
            "No significant interaction found (p = {})",
            fmt_p(analysis.interaction_p)
        )
    }
}

/// `p = 0.1234` or `n/a (reason)`
pub fn check_text(check: &Check) -> String {
    match check {
        Check::Computed(r) => format!("p = {}", fmt_p(r.p_value)),
        Check::Unavailable { reason } => format!("n/a ({})", reason),
    }
}
