//! Styled terminal output: KPI cards, tables and braille charts

use console::style;
use std::fmt::Write;

use crate::core::anova::significance_stars;
use crate::core::describe::{ColumnSummary, CrossTab, GroupStatsTable, Kpis};
use crate::core::pipeline::{
    DatasetAnalysis, DatasetReport, Header, InteractionSummary, Overview, Report, Section,
};
use crate::render::viz::{self, CHART_HEIGHT, CHART_WIDTH};
use crate::render::{
    anova_records, build_table, check_text, fmt_num, interaction_message, RenderError,
    Renderer, TableStyle, View,
};

/// Renders reports for an interactive terminal
#[derive(Debug, Clone)]
pub struct TerminalRenderer {
    /// Draw histograms and braille charts
    pub charts: bool,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self { charts: true }
    }
}

fn rule() -> String {
    style("─".repeat(72)).dim().to_string()
}

fn heading(out: &mut String, text: &str) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{}", rule())?;
    writeln!(out, "{} {}", style("◆").cyan(), style(text).bold())?;
    writeln!(out, "{}", rule())
}

fn write_missing<T>(out: &mut String, section: &Section<T>) -> std::fmt::Result {
    match section {
        Section::Ready(_) => Ok(()),
        Section::Missing { message, .. } => {
            writeln!(out, "{} {}", style("!").yellow(), style(message).yellow())
        }
        Section::Failed { message } => writeln!(out, "{} {}", style("✗").red(), message),
    }
}

impl TerminalRenderer {
    pub fn new(charts: bool) -> Self {
        Self { charts }
    }

    fn header(&self, out: &mut String, header: &Header) -> std::fmt::Result {
        writeln!(out, "{}", style(&header.title).bold().underlined())?;
        if !header.authors.is_empty() {
            writeln!(out, "{} {}", style("Authors:").bold(), header.authors.join(", "))?;
        }
        writeln!(
            out,
            "{} {}",
            style("Generated:").bold(),
            header.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        for source in &header.sources {
            let digest = source
                .digest
                .as_deref()
                .map(|d| &d[..d.len().min(12)])
                .unwrap_or("-");
            writeln!(
                out,
                "  {} {} {}",
                style(source.path.display()).dim(),
                style(format!("{} rows", source.rows)).cyan(),
                style(format!("sha256:{}", digest)).dim()
            )?;
        }
        Ok(())
    }

    fn kpis(&self, out: &mut String, k: &Kpis) -> std::fmt::Result {
        let cards = [
            ("Participants", k.participants.to_string()),
            ("Mean RT raw (ms)", fmt_num(k.mean_rt_raw, 1)),
            ("Mean RT log", fmt_num(k.mean_rt_log, 3)),
            ("SD RT raw (ms)", fmt_num(k.std_rt_raw, 1)),
        ];
        for (label, value) in cards {
            writeln!(
                out,
                "  {:<18} {}",
                style(label).dim(),
                style(value).bold().green()
            )?;
        }
        Ok(())
    }

    fn overview(&self, out: &mut String, o: &Overview) -> std::fmt::Result {
        heading(out, "Key behavioral indicators")?;
        self.kpis(out, &o.kpis)?;

        heading(out, "Statistical summary")?;
        writeln!(out, "{}", summary_table(&o.summary, TableStyle::Rounded))?;

        writeln!(out)?;
        writeln!(out, "{}", style("Design balance").bold())?;
        writeln!(out, "{}", balance_table(&o.balance, TableStyle::Rounded))?;
        if o.balance.is_balanced() {
            writeln!(out, "{} Every prime x target cell has the same count", style("✓").green())?;
        } else {
            writeln!(out, "{} Cell counts differ", style("⚠").yellow())?;
        }

        let f = &o.outliers;
        writeln!(
            out,
            "\n{} {} < {} < {}: kept {}, removed {}{}",
            style("Outlier filter").bold(),
            f.low,
            f.column,
            f.high,
            style(f.kept).green(),
            style(f.removed).yellow(),
            if f.applied {
                " (applied to analyses)"
            } else {
                " (reported only)"
            }
        )?;

        if self.charts {
            heading(out, "Reaction-time distributions")?;
            for d in &o.distributions {
                writeln!(out, "{}", viz::render_histogram(&d.histogram))?;
                if let Some(qq) = &d.qq {
                    writeln!(out, "\n  {} Q-Q plot", style(&d.histogram.column).bold())?;
                    writeln!(out, "{}", viz::render_qq(qq, CHART_WIDTH, CHART_HEIGHT))?;
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }

    fn interaction(&self, out: &mut String, i: &InteractionSummary) -> std::fmt::Result {
        heading(out, "Prime x target interaction")?;
        writeln!(out, "{}", group_table(&i.cells, TableStyle::Rounded))?;
        if self.charts {
            writeln!(out)?;
            writeln!(
                out,
                "{}",
                viz::render_interaction(&i.cells, CHART_WIDTH, CHART_HEIGHT)
            )?;
        }
        Ok(())
    }

    fn analysis(&self, out: &mut String, a: &DatasetAnalysis, alpha: f64) -> std::fmt::Result {
        writeln!(
            out,
            "{} {} rows, {} subjects, DV {}",
            style("Data:").bold(),
            a.rows,
            a.anova.n_subjects,
            style(&a.anova.dv).cyan()
        )?;
        writeln!(out, "{}", build_table(anova_records(&a.anova), TableStyle::Rounded))?;

        for row in a.anova.effects() {
            let p = row.p.unwrap_or(f64::NAN);
            let stars = if p.is_nan() { "n/a" } else { significance_stars(p) };
            writeln!(
                out,
                "  {:<18} {:<4} partial η² = {}",
                row.source,
                if p < alpha {
                    style(stars).green().bold()
                } else {
                    style(stars).dim()
                },
                fmt_num(row.np2.unwrap_or(f64::NAN), 3)
            )?;
        }

        let message = interaction_message(a);
        if a.interaction_significant {
            writeln!(out, "{} {}", style("✓").green(), style(message).green())?;
        } else {
            writeln!(out, "{} {}", style("ℹ").blue(), message)?;
        }

        let d = &a.diagnostics;
        writeln!(out, "\n{}", style("Model assumptions (residuals)").bold())?;
        writeln!(out, "  Normality (Shapiro-Wilk):  {}", check_text(&d.normality))?;
        writeln!(out, "  Homogeneity (Levene):      {}", check_text(&d.homogeneity))?;
        let verdict = if d.verdict.is_ok() {
            style(format!("✓ {}", d.verdict.message())).green()
        } else {
            style(format!("⚠ {}", d.verdict.message())).yellow()
        };
        writeln!(out, "  {}", verdict)?;

        if self.charts {
            if let Some(qq) = &d.qq {
                writeln!(out, "\n  Residual Q-Q plot")?;
                writeln!(out, "{}", viz::render_qq(qq, CHART_WIDTH, CHART_HEIGHT))?;
            }
        }
        Ok(())
    }

    fn dataset(&self, out: &mut String, d: &DatasetReport, alpha: f64) -> std::fmt::Result {
        heading(out, &format!("Repeated-measures ANOVA: {}", d.title))?;
        match &d.section {
            Section::Ready(a) => self.analysis(out, a, alpha),
            other => write_missing(out, other),
        }
    }
}

impl Renderer for TerminalRenderer {
    fn render(&self, report: &Report, view: View) -> Result<String, RenderError> {
        let mut out = String::new();
        self.header(&mut out, &report.header)?;

        if let Some(reason) = &report.stopped {
            writeln!(out, "\n{} {}", style("✗").red(), style(reason).red())?;
            return Ok(out);
        }

        if view.shows_overview() {
            match &report.overview {
                Some(Section::Ready(o)) => self.overview(&mut out, o)?,
                Some(other) => write_missing(&mut out, other)?,
                None => {}
            }
        }
        if view.shows_interaction() {
            match &report.interaction {
                Some(Section::Ready(i)) => self.interaction(&mut out, i)?,
                Some(other) => write_missing(&mut out, other)?,
                None => {}
            }
        }
        for d in report.datasets.iter().filter(|d| view.shows_dataset(d.kind)) {
            self.dataset(&mut out, d, report.alpha)?;
        }
        Ok(out)
    }

    fn render_analysis(
        &self,
        analysis: &DatasetAnalysis,
        alpha: f64,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        writeln!(
            out,
            "{}",
            style(format!("Repeated-measures ANOVA: {}", analysis.kind.title())).bold()
        )?;
        self.analysis(&mut out, analysis, alpha)?;
        Ok(out)
    }
}

/// `describe()` table: one row per statistic, one column per variable
pub fn summary_table(summary: &[ColumnSummary], table_style: TableStyle) -> String {
    let mut records = vec![std::iter::once(String::new())
        .chain(summary.iter().map(|s| s.column.clone()))
        .collect::<Vec<_>>()];
    let stats: [(&str, fn(&ColumnSummary) -> f64); 8] = [
        ("count", |s| s.count as f64),
        ("mean", |s| s.mean),
        ("std", |s| s.std),
        ("min", |s| s.min),
        ("25%", |s| s.q25),
        ("50%", |s| s.median),
        ("75%", |s| s.q75),
        ("max", |s| s.max),
    ];
    for (label, get) in stats {
        let precision = if label == "count" { 0 } else { 3 };
        records.push(
            std::iter::once(label.to_string())
                .chain(summary.iter().map(|s| fmt_num(get(s), precision)))
                .collect(),
        );
    }
    build_table(records, table_style)
}

/// Cross-tabulated cell counts
pub fn balance_table(tab: &CrossTab, table_style: TableStyle) -> String {
    let mut records = vec![std::iter::once(format!("{} \\ {}", tab.row_factor, tab.col_factor))
        .chain(tab.col_levels.iter().cloned())
        .collect::<Vec<_>>()];
    for (level, counts) in tab.row_levels.iter().zip(&tab.counts) {
        records.push(
            std::iter::once(level.clone())
                .chain(counts.iter().map(usize::to_string))
                .collect(),
        );
    }
    build_table(records, table_style)
}

/// Per-group count, mean, SD, median and SEM
pub fn group_table(stats: &GroupStatsTable, table_style: TableStyle) -> String {
    let mut header: Vec<String> = stats.group_cols.clone();
    header.extend(["n", "mean", "std", "median", "sem"].map(str::to_string));
    let mut records = vec![header];
    for g in &stats.groups {
        let mut row = g.key.clone();
        row.push(g.count.to_string());
        row.extend([g.mean, g.std, g.median, g.sem].map(|x| fmt_num(x, 4)));
        records.push(row);
    }
    build_table(records, table_style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::describe::design_balance;
    use crate::core::table::{Column, DataTable, Factor};

    #[test]
    fn test_balance_table_lists_levels() {
        let table = DataTable::from_columns([
            ("prime", Column::Categorical(Factor::from_labels(&["Black", "White"]))),
            ("target", Column::Categorical(Factor::from_labels(&["gun", "tool"]))),
        ])
        .unwrap();
        let tab = design_balance(&table, "prime", "target").unwrap();
        let output = balance_table(&tab, TableStyle::Rounded);
        assert!(output.contains("prime \\ target"));
        assert!(output.contains("Black"));
        assert!(output.contains("tool"));
    }

    #[test]
    fn test_render_stopped_report_shows_reason() {
        let report = Report {
            header: Header {
                title: "Study".to_string(),
                authors: vec![],
                generated_at: chrono::Utc::now(),
                sources: vec![],
            },
            stopped: Some("File 'beh.csv' not found".to_string()),
            alpha: 0.05,
            overview: None,
            interaction: None,
            datasets: vec![],
        };
        let output = TerminalRenderer::default()
            .render(&report, View::All)
            .unwrap();
        assert!(output.contains("Study"));
        assert!(output.contains("beh.csv"));
    }
}
