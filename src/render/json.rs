//! Machine-readable JSON output
//!
//! Non-finite numbers (e.g. an F statistic with zero error variance) are
//! written as `null`.

use serde::Serialize;

use crate::core::pipeline::{
    DatasetAnalysis, DatasetReport, Header, InteractionSummary, Overview, Report, Section,
};
use crate::render::{RenderError, Renderer, View};

#[derive(Debug, Clone, Default)]
pub struct JsonRenderer {
    pub pretty: bool,
}

/// The parts of a report selected by a view
#[derive(Serialize)]
struct Selected<'a> {
    header: &'a Header,
    #[serde(skip_serializing_if = "Option::is_none")]
    stopped: Option<&'a str>,
    alpha: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    overview: Option<&'a Section<Overview>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interaction: Option<&'a Section<InteractionSummary>>,
    datasets: Vec<&'a DatasetReport>,
}

impl JsonRenderer {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, RenderError> {
        let mut text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        text.push('\n');
        Ok(text)
    }
}

impl Renderer for JsonRenderer {
    fn render(&self, report: &Report, view: View) -> Result<String, RenderError> {
        let selected = Selected {
            header: &report.header,
            stopped: report.stopped.as_deref(),
            alpha: report.alpha,
            overview: report
                .overview
                .as_ref()
                .filter(|_| view.shows_overview()),
            interaction: report
                .interaction
                .as_ref()
                .filter(|_| view.shows_interaction()),
            datasets: report
                .datasets
                .iter()
                .filter(|d| view.shows_dataset(d.kind))
                .collect(),
        };
        self.encode(&selected)
    }

    fn render_analysis(
        &self,
        analysis: &DatasetAnalysis,
        _alpha: f64,
    ) -> Result<String, RenderError> {
        self.encode(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::DatasetKind;

    fn stopped_report() -> Report {
        Report {
            header: Header {
                title: "Study".to_string(),
                authors: vec!["A. Author".to_string()],
                generated_at: chrono::Utc::now(),
                sources: vec![],
            },
            stopped: None,
            alpha: 0.05,
            overview: Some(Section::Failed {
                message: "boom".to_string(),
            }),
            interaction: None,
            datasets: vec![DatasetReport {
                kind: DatasetKind::Mvpa,
                title: DatasetKind::Mvpa.title().to_string(),
                section: Section::Missing {
                    path: "mvpa.csv".into(),
                    message: "File 'mvpa.csv' not found".to_string(),
                },
            }],
        }
    }

    #[test]
    fn test_sections_are_tagged() {
        let text = JsonRenderer::default()
            .render(&stopped_report(), View::All)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["overview"]["status"], "failed");
        assert_eq!(value["datasets"][0]["kind"], "mvpa");
        assert_eq!(value["datasets"][0]["section"]["status"], "missing");
        assert!(value.get("interaction").is_none());
    }

    #[test]
    fn test_view_filters_sections() {
        let text = JsonRenderer::default()
            .render(&stopped_report(), View::Dataset(DatasetKind::Searchlight))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert!(value.get("overview").is_none());
        assert_eq!(value["datasets"].as_array().map(Vec::len), Some(0));
    }
}
