//! GitHub-flavored Markdown report

use std::fmt::Write;

use crate::core::anova::significance_stars;
use crate::core::pipeline::{DatasetAnalysis, Report, Section};
use crate::render::terminal::{balance_table, group_table, summary_table};
use crate::render::{
    anova_records, build_table, check_text, fmt_num, interaction_message, RenderError, Renderer,
    TableStyle, View,
};

#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer;

fn section_note<T>(out: &mut String, section: &Section<T>) -> std::fmt::Result {
    match section {
        Section::Ready(_) => Ok(()),
        Section::Missing { message, .. } => writeln!(out, "> **Missing:** {}\n", message),
        Section::Failed { message } => writeln!(out, "> **Error:** {}\n", message),
    }
}

fn analysis(out: &mut String, a: &DatasetAnalysis) -> std::fmt::Result {
    writeln!(
        out,
        "{} rows, {} subjects, dependent variable `{}`.\n",
        a.rows, a.anova.n_subjects, a.anova.dv
    )?;
    writeln!(out, "{}\n", build_table(anova_records(&a.anova), TableStyle::Markdown))?;

    for row in a.anova.effects() {
        let p = row.p.unwrap_or(f64::NAN);
        writeln!(
            out,
            "- `{}`: {}, partial η² = {}",
            row.source,
            if p.is_nan() { "n/a" } else { significance_stars(p) },
            fmt_num(row.np2.unwrap_or(f64::NAN), 3)
        )?;
    }
    writeln!(out, "\n**{}.**\n", interaction_message(a))?;

    let d = &a.diagnostics;
    writeln!(out, "#### Model assumptions\n")?;
    writeln!(out, "- Normality (Shapiro-Wilk): {}", check_text(&d.normality))?;
    writeln!(out, "- Homogeneity (Levene): {}", check_text(&d.homogeneity))?;
    writeln!(out, "- Verdict: {}\n", d.verdict.message())
}

impl Renderer for MarkdownRenderer {
    fn render(&self, report: &Report, view: View) -> Result<String, RenderError> {
        let mut out = String::new();
        let h = &report.header;
        writeln!(out, "# {}\n", h.title)?;
        if !h.authors.is_empty() {
            writeln!(out, "**Authors:** {}\n", h.authors.join(", "))?;
        }
        writeln!(
            out,
            "_Generated {}_\n",
            h.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        for s in &h.sources {
            writeln!(
                out,
                "- `{}`: {} rows{}",
                s.path.display(),
                s.rows,
                s.digest
                    .as_deref()
                    .map(|d| format!(", sha256 `{}`", d))
                    .unwrap_or_default()
            )?;
        }
        writeln!(out)?;

        if let Some(reason) = &report.stopped {
            writeln!(out, "> **Error:** {}", reason)?;
            return Ok(out);
        }

        if view.shows_overview() {
            if let Some(section) = &report.overview {
                writeln!(out, "## Overview\n")?;
                match section {
                    Section::Ready(o) => {
                        let k = &o.kpis;
                        writeln!(out, "| Participants | Mean RT raw | Mean RT log | SD RT raw |")?;
                        writeln!(out, "|---:|---:|---:|---:|")?;
                        writeln!(
                            out,
                            "| {} | {} | {} | {} |\n",
                            k.participants,
                            fmt_num(k.mean_rt_raw, 1),
                            fmt_num(k.mean_rt_log, 3),
                            fmt_num(k.std_rt_raw, 1)
                        )?;
                        writeln!(out, "### Statistical summary\n")?;
                        writeln!(out, "{}\n", summary_table(&o.summary, TableStyle::Markdown))?;
                        writeln!(out, "### Design balance\n")?;
                        writeln!(out, "{}\n", balance_table(&o.balance, TableStyle::Markdown))?;
                        let f = &o.outliers;
                        writeln!(
                            out,
                            "Outlier filter {} < `{}` < {}: kept {}, removed {}{}.\n",
                            f.low,
                            f.column,
                            f.high,
                            f.kept,
                            f.removed,
                            if f.applied { " (applied to analyses)" } else { "" }
                        )?;
                    }
                    other => section_note(&mut out, other)?,
                }
            }
        }

        if view.shows_interaction() {
            if let Some(section) = &report.interaction {
                writeln!(out, "## Prime x target interaction\n")?;
                match section {
                    Section::Ready(i) => {
                        writeln!(out, "{}\n", group_table(&i.cells, TableStyle::Markdown))?
                    }
                    other => section_note(&mut out, other)?,
                }
            }
        }

        for d in report.datasets.iter().filter(|d| view.shows_dataset(d.kind)) {
            writeln!(out, "## Repeated-measures ANOVA: {}\n", d.title)?;
            match &d.section {
                Section::Ready(a) => analysis(&mut out, a)?,
                other => section_note(&mut out, other)?,
            }
        }
        Ok(out)
    }

    fn render_analysis(
        &self,
        a: &DatasetAnalysis,
        _alpha: f64,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        writeln!(out, "## Repeated-measures ANOVA: {}\n", a.kind.title())?;
        analysis(&mut out, a)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::anova::rm_anova;
    use crate::core::diagnostics::Verdict;
    use crate::core::pipeline::{Check, DatasetKind, DatasetReport, Header, ResidualDiagnostics};
    use crate::core::table::{Column, DataTable, Factor};

    fn analysis() -> DatasetAnalysis {
        let table = DataTable::from_columns([
            (
                "id",
                Column::Categorical(Factor::from_labels(&["1", "1", "1", "1", "2", "2", "2", "2"])),
            ),
            (
                "prime",
                Column::Categorical(Factor::from_labels(&[
                    "Black", "Black", "White", "White", "Black", "Black", "White", "White",
                ])),
            ),
            (
                "target",
                Column::Categorical(Factor::from_labels(&[
                    "gun", "tool", "gun", "tool", "gun", "tool", "gun", "tool",
                ])),
            ),
            (
                "value",
                Column::Numeric(vec![1.0, 2.0, 3.0, 6.0, 2.0, 4.0, 4.0, 6.0]),
            ),
        ])
        .unwrap();
        let anova = rm_anova(&table, "value", "id", "prime", "target").unwrap();
        let interaction_p = anova.interaction_p().unwrap();
        DatasetAnalysis {
            kind: DatasetKind::Mvpa,
            rows: table.n_rows(),
            anova,
            interaction_p,
            interaction_significant: false,
            diagnostics: ResidualDiagnostics {
                n: 8,
                normality: Check::Unavailable {
                    reason: "too few values".to_string(),
                },
                homogeneity: Check::Unavailable {
                    reason: "too few values".to_string(),
                },
                qq: None,
                verdict: Verdict::Inconclusive,
            },
        }
    }

    #[test]
    fn test_render_analysis_has_minitab_headings() {
        let output = MarkdownRenderer.render_analysis(&analysis(), 0.05).unwrap();

        assert!(output.starts_with("## Repeated-measures ANOVA: MVPA"));
        for heading in ["Source", "DF", "Adj SS", "Adj MS", "F-Value", "P-Value"] {
            assert!(output.contains(heading), "missing heading {heading}");
        }
        assert!(output.contains("| prime * target"));
        assert!(output.contains("No significant interaction found (p = 0.5000)"));
        assert!(output.contains("n/a (too few values)"));
    }

    #[test]
    fn test_render_marks_missing_sections() {
        let report = Report {
            header: Header {
                title: "Study".to_string(),
                authors: vec!["A. Author".to_string()],
                generated_at: chrono::Utc::now(),
                sources: vec![],
            },
            stopped: None,
            alpha: 0.05,
            overview: None,
            interaction: None,
            datasets: vec![
                DatasetReport {
                    kind: DatasetKind::Mvpa,
                    title: DatasetKind::Mvpa.title().to_string(),
                    section: Section::Ready(analysis()),
                },
                DatasetReport {
                    kind: DatasetKind::Searchlight,
                    title: DatasetKind::Searchlight.title().to_string(),
                    section: Section::Missing {
                        path: "searchlight.csv".into(),
                        message: "File 'searchlight.csv' not found".to_string(),
                    },
                },
            ],
        };

        let output = MarkdownRenderer.render(&report, View::All).unwrap();
        assert!(output.starts_with("# Study"));
        assert!(output.contains("**Authors:** A. Author"));
        assert!(output.contains("## Repeated-measures ANOVA: Searchlight WIT"));
        assert!(output.contains("> **Missing:** File 'searchlight.csv' not found"));

        let only_search = MarkdownRenderer
            .render(&report, View::Dataset(DatasetKind::Searchlight))
            .unwrap();
        assert!(!only_search.contains("Adj SS"));
    }
}
