//! Report pipeline
//!
//! Loads the three configured datasets through a caller-owned
//! [`DatasetCache`], runs the descriptive, ANOVA and diagnostic stages and
//! collects everything into a [`Report`] of plain data. A missing or broken
//! dataset degrades only its own section.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::core::anova::{rm_anova, AnovaTable, DesignError};
use crate::core::clean::{clean_neuro_value, filter_outliers, CleanError};
use crate::core::config::Config;
use crate::core::describe::{
    describe, design_balance, group_stats, histogram, kpis, ColumnSummary, CrossTab,
    GroupStatsTable, Histogram, Kpis,
};
use crate::core::diagnostics::{
    assess, homogeneity_test, normality_test, qq_points, residual_groups, residuals,
    DiagnosticError, QqPoints, TestResult, Verdict,
};
use crate::core::loader::{DatasetCache, LoadError};
use crate::core::table::{ColumnError, DataTable};

pub const SUBJECT: &str = "id";
pub const FACTOR_A: &str = "prime";
pub const FACTOR_B: &str = "target";

/// The three datasets of the study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Behavioral,
    Mvpa,
    Searchlight,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Behavioral,
        DatasetKind::Mvpa,
        DatasetKind::Searchlight,
    ];

    /// Dependent variable analysed for this dataset
    pub fn dv(self) -> &'static str {
        match self {
            DatasetKind::Behavioral => "rt_log",
            DatasetKind::Mvpa | DatasetKind::Searchlight => "value",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            DatasetKind::Behavioral => "Behavioral reaction times (log RT)",
            DatasetKind::Mvpa => "MVPA - object-sensitive WIT",
            DatasetKind::Searchlight => "Searchlight WIT",
        }
    }

    /// True for the neuro-derived tables whose `value` needs repair
    pub fn is_neuro(self) -> bool {
        !matches!(self, DatasetKind::Behavioral)
    }

    /// Path of this dataset under the configured data directory
    pub fn path(self, config: &Config) -> PathBuf {
        let file = match self {
            DatasetKind::Behavioral => &config.datasets.behavioral,
            DatasetKind::Mvpa => &config.datasets.mvpa,
            DatasetKind::Searchlight => &config.datasets.searchlight,
        };
        config.dataset_path(file)
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetKind::Behavioral => write!(f, "behavioral"),
            DatasetKind::Mvpa => write!(f, "mvpa"),
            DatasetKind::Searchlight => write!(f, "searchlight"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error(transparent)]
    Design(#[from] DesignError),

    #[error(transparent)]
    Column(#[from] ColumnError),
}

impl PipelineError {
    pub fn is_missing(&self) -> bool {
        matches!(self, PipelineError::Load(LoadError::NotFound { .. }))
    }
}

/// Outcome of one report section
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Section<T> {
    Ready(T),
    /// Input file absent
    Missing { path: PathBuf, message: String },
    /// Input present but the stage failed
    Failed { message: String },
}

impl<T> Section<T> {
    fn from_result(result: Result<T, PipelineError>) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(PipelineError::Load(LoadError::NotFound { path })) => {
                let message = LoadError::NotFound { path: path.clone() }.to_string();
                Section::Missing { path, message }
            }
            Err(e) => {
                log::warn!("section failed: {}", e);
                Section::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Provenance of one input file
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub kind: DatasetKind,
    pub path: PathBuf,
    pub rows: usize,
    pub digest: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Header {
    pub title: String,
    pub authors: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<SourceInfo>,
}

/// Rows kept and removed by the reaction-time filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierSummary {
    pub column: String,
    pub low: f64,
    pub high: f64,
    pub kept: usize,
    pub removed: usize,
    /// Whether the analyses ran on the filtered table
    pub applied: bool,
}

/// Distribution of one reaction-time column
#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    pub histogram: Histogram,
    pub qq: Option<QqPoints>,
}

/// Exploration tab: KPIs, summaries and distributions
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub kpis: Kpis,
    pub summary: Vec<ColumnSummary>,
    pub balance: CrossTab,
    pub outliers: OutlierSummary,
    pub distributions: Vec<Distribution>,
}

/// Interaction tab: `rt_log` cell statistics by prime and target
#[derive(Debug, Clone, Serialize)]
pub struct InteractionSummary {
    pub dv: String,
    pub cells: GroupStatsTable,
}

/// A diagnostic test that may not be computable
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Check {
    Computed(TestResult),
    Unavailable { reason: String },
}

impl Check {
    pub fn result(&self) -> Option<&TestResult> {
        match self {
            Check::Computed(r) => Some(r),
            Check::Unavailable { .. } => None,
        }
    }
}

impl From<Result<TestResult, DiagnosticError>> for Check {
    fn from(result: Result<TestResult, DiagnosticError>) -> Self {
        match result {
            Ok(r) => Check::Computed(r),
            Err(e) => Check::Unavailable {
                reason: e.to_string(),
            },
        }
    }
}

/// Residual checks of one ANOVA model
#[derive(Debug, Clone, Serialize)]
pub struct ResidualDiagnostics {
    pub n: usize,
    pub normality: Check,
    pub homogeneity: Check,
    pub qq: Option<QqPoints>,
    pub verdict: Verdict,
}

/// ANOVA and diagnostics of one dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetAnalysis {
    pub kind: DatasetKind,
    pub rows: usize,
    pub anova: AnovaTable,
    pub interaction_p: f64,
    pub interaction_significant: bool,
    pub diagnostics: ResidualDiagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub kind: DatasetKind,
    pub title: String,
    pub section: Section<DatasetAnalysis>,
}

/// Everything a renderer needs
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub header: Header,
    /// Set when the behavioral dataset could not be loaded
    pub stopped: Option<String>,
    pub alpha: f64,
    pub overview: Option<Section<Overview>>,
    pub interaction: Option<Section<InteractionSummary>>,
    pub datasets: Vec<DatasetReport>,
}

impl Report {
    pub fn dataset(&self, kind: DatasetKind) -> Option<&DatasetReport> {
        self.datasets.iter().find(|d| d.kind == kind)
    }
}

/// Runs the analysis stages against a shared cache
pub struct Pipeline<'a> {
    config: &'a Config,
    cache: &'a mut DatasetCache,
    sources: Vec<SourceInfo>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, cache: &'a mut DatasetCache) -> Self {
        Self {
            config,
            cache,
            sources: Vec::new(),
        }
    }

    /// Load a dataset, repairing neuro values; missing files are an error here
    pub fn dataset(&mut self, kind: DatasetKind) -> Result<Arc<DataTable>, PipelineError> {
        let path = kind.path(self.config);
        let loaded = self.cache.load(&path)?;
        if loaded.is_missing() {
            return Err(LoadError::NotFound { path }.into());
        }
        self.sources.retain(|s| s.kind != kind);
        self.sources.push(SourceInfo {
            kind,
            path,
            rows: loaded.table.n_rows(),
            digest: loaded.digest.clone(),
            loaded_at: loaded.loaded_at,
        });

        if kind.is_neuro() {
            Ok(Arc::new(clean_neuro_value(&loaded.table)?))
        } else {
            Ok(loaded.table)
        }
    }

    /// The table the analyses of `kind` run on
    pub fn analysis_table(&mut self, kind: DatasetKind) -> Result<Arc<DataTable>, PipelineError> {
        let table = self.dataset(kind)?;
        if kind == DatasetKind::Behavioral && self.config.outliers.apply_to_analysis {
            let o = &self.config.outliers;
            return Ok(Arc::new(filter_outliers(&table, &o.column, o.low, o.high)?));
        }
        Ok(table)
    }

    /// ANOVA, residual checks and verdict for one dataset
    pub fn analyze(&mut self, kind: DatasetKind) -> Result<DatasetAnalysis, PipelineError> {
        let table = self.analysis_table(kind)?;
        let dv = kind.dv();
        let anova = rm_anova(&table, dv, SUBJECT, FACTOR_A, FACTOR_B)?;
        let diagnostics = self.residual_diagnostics(&table, dv)?;

        let interaction_p = anova.interaction_p().unwrap_or(f64::NAN);
        log::info!("{}: interaction p = {:.4}", kind, interaction_p);
        Ok(DatasetAnalysis {
            kind,
            rows: table.n_rows(),
            interaction_significant: interaction_p < self.config.alpha,
            interaction_p,
            anova,
            diagnostics,
        })
    }

    fn residual_diagnostics(
        &self,
        table: &DataTable,
        dv: &str,
    ) -> Result<ResidualDiagnostics, ColumnError> {
        let res = residuals(table, dv, SUBJECT, FACTOR_A, FACTOR_B)?;
        let groups = residual_groups(table, &res, FACTOR_A, FACTOR_B)?;
        let normality = Check::from(normality_test(&res));
        let homogeneity = Check::from(homogeneity_test(&groups, self.config.levene_center));
        let verdict = assess(normality.result(), homogeneity.result(), self.config.alpha);
        Ok(ResidualDiagnostics {
            n: res.len(),
            qq: qq_points(&res).ok(),
            normality,
            homogeneity,
            verdict,
        })
    }

    fn overview(&self, table: &DataTable) -> Result<Overview, ColumnError> {
        let o = &self.config.outliers;
        let kept = filter_outliers(table, &o.column, o.low, o.high)?.n_rows();
        let outliers = OutlierSummary {
            column: o.column.clone(),
            low: o.low,
            high: o.high,
            kept,
            removed: table.n_rows() - kept,
            applied: o.apply_to_analysis,
        };

        let distributions = ["rt_raw", "rt_log"]
            .iter()
            .map(|col| {
                let xs = table.numeric(col)?;
                Ok(Distribution {
                    histogram: histogram(col, xs, self.config.histogram_bins),
                    qq: qq_points(xs).ok(),
                })
            })
            .collect::<Result<Vec<_>, ColumnError>>()?;

        Ok(Overview {
            kpis: kpis(table)?,
            summary: describe(table),
            balance: design_balance(table, FACTOR_A, FACTOR_B)?,
            outliers,
            distributions,
        })
    }

    fn interaction(&self, table: &DataTable) -> Result<InteractionSummary, ColumnError> {
        let dv = DatasetKind::Behavioral.dv();
        Ok(InteractionSummary {
            dv: dv.to_string(),
            cells: group_stats(table, &[FACTOR_A, FACTOR_B], dv)?,
        })
    }

    fn header(&self) -> Header {
        Header {
            title: self.config.study.title.clone(),
            authors: self.config.study.authors.clone(),
            generated_at: Utc::now(),
            sources: self.sources.clone(),
        }
    }

    /// Build the full report
    ///
    /// If the behavioral dataset cannot be loaded, the report holds only
    /// the header and the reason it stopped.
    pub fn run(&mut self) -> Report {
        let alpha = self.config.alpha;
        let behavioral = match self.dataset(DatasetKind::Behavioral) {
            Ok(table) => table,
            Err(e) => {
                log::error!("behavioral dataset unavailable: {}", e);
                return Report {
                    header: self.header(),
                    stopped: Some(e.to_string()),
                    alpha,
                    overview: None,
                    interaction: None,
                    datasets: Vec::new(),
                };
            }
        };

        let overview = Section::from_result(self.overview(&behavioral).map_err(Into::into));
        let interaction =
            Section::from_result(self.interaction(&behavioral).map_err(Into::into));
        let datasets = DatasetKind::ALL
            .iter()
            .map(|&kind| DatasetReport {
                kind,
                title: kind.title().to_string(),
                section: Section::from_result(self.analyze(kind)),
            })
            .collect();

        Report {
            header: self.header(),
            stopped: None,
            alpha,
            overview: Some(overview),
            interaction: Some(interaction),
            datasets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    /// Behavioral CSV: 3 subjects x 2 primes x 2 targets x 2 trials
    fn behavioral_csv() -> String {
        let mut csv = String::from("id,prime,target,rt_raw,rt_log\n");
        for s in 1..=3 {
            for (i, prime) in ["Black", "White"].iter().enumerate() {
                for (j, target) in ["gun", "tool"].iter().enumerate() {
                    for t in 0..2 {
                        let raw = 400.0
                            + 25.0 * s as f64
                            + 30.0 * j as f64
                            + 45.0 * (i * j) as f64
                            + 11.0 * ((s + 3 * t + i) % 4) as f64;
                        writeln!(csv, "{},{},{},{},{:.5}", s, prime, target, raw, f64::ln(raw))
                            .unwrap();
                    }
                }
            }
        }
        csv
    }

    fn neuro_csv() -> String {
        let mut csv = String::from("id,prime,target,value\n");
        for s in 1..=3 {
            for (i, prime) in ["Black", "White"].iter().enumerate() {
                for (j, target) in ["gun", "tool"].iter().enumerate() {
                    let v = 0.1 * s as f64 + 0.05 * i as f64 + 0.02 * ((s + i + 2 * j) % 3) as f64;
                    // Doubled decimal point, as found in the exported files
                    let text = format!("{:.4}", v).replacen('.', "..", 1);
                    writeln!(csv, "{},{},{},{}", s, prime, target, text).unwrap();
                }
            }
        }
        csv
    }

    fn setup(with_neuro: bool) -> (TempDir, Config) {
        let tmp = tempdir().unwrap();
        let config = Config {
            data_dir: tmp.path().to_path_buf(),
            ..Config::default()
        };
        fs::write(tmp.path().join(&config.datasets.behavioral), behavioral_csv()).unwrap();
        if with_neuro {
            fs::write(tmp.path().join(&config.datasets.mvpa), neuro_csv()).unwrap();
        }
        (tmp, config)
    }

    #[test]
    fn test_full_report_with_missing_neuro_file() {
        let (_tmp, config) = setup(true);
        let mut cache = DatasetCache::new();
        let report = Pipeline::new(&config, &mut cache).run();

        assert!(report.stopped.is_none());
        let overview = report.overview.as_ref().and_then(Section::ready).unwrap();
        assert_eq!(overview.kpis.participants, 3);
        assert!(overview.balance.is_balanced());
        assert_eq!(overview.distributions.len(), 2);

        let beh = report.dataset(DatasetKind::Behavioral).unwrap();
        assert!(matches!(beh.section, Section::Ready(_)));
        let mvpa = report.dataset(DatasetKind::Mvpa).unwrap();
        assert!(matches!(mvpa.section, Section::Ready(_)));
        let search = report.dataset(DatasetKind::Searchlight).unwrap();
        assert!(matches!(search.section, Section::Missing { .. }));

        assert_eq!(report.header.sources.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_missing_behavioral_stops_report() {
        let tmp = tempdir().unwrap();
        let config = Config {
            data_dir: tmp.path().to_path_buf(),
            ..Config::default()
        };
        let mut cache = DatasetCache::new();
        let report = Pipeline::new(&config, &mut cache).run();

        assert!(report.stopped.unwrap().contains("not found"));
        assert!(report.overview.is_none());
        assert!(report.datasets.is_empty());
    }

    #[test]
    fn test_unbalanced_neuro_fails_only_its_section() {
        let (tmp, config) = setup(false);
        let mut lines: Vec<String> = neuro_csv().lines().map(str::to_string).collect();
        lines.pop();
        fs::write(tmp.path().join(&config.datasets.searchlight), lines.join("\n")).unwrap();

        let mut cache = DatasetCache::new();
        let report = Pipeline::new(&config, &mut cache).run();

        let search = report.dataset(DatasetKind::Searchlight).unwrap();
        match &search.section {
            Section::Failed { message } => assert!(message.contains("no observations")),
            other => panic!("unexpected section: {other:?}"),
        }
        assert!(report
            .dataset(DatasetKind::Behavioral)
            .and_then(|d| d.section.ready())
            .is_some());
    }

    #[test]
    fn test_neuro_values_are_repaired() {
        let (_tmp, config) = setup(true);
        let mut cache = DatasetCache::new();
        let table = Pipeline::new(&config, &mut cache)
            .dataset(DatasetKind::Mvpa)
            .unwrap();
        let values = table.numeric("value").unwrap();
        assert_eq!(values.len(), 12);
        assert!(values.iter().all(|v| *v > 0.0 && *v < 1.0));
    }

    #[test]
    fn test_blank_reaction_time_keeps_overview() {
        let (tmp, config) = setup(false);
        let mut csv = behavioral_csv();
        csv.push_str("3,White,tool,,6.5\n");
        fs::write(tmp.path().join(&config.datasets.behavioral), csv).unwrap();

        let mut cache = DatasetCache::new();
        let report = Pipeline::new(&config, &mut cache).run();
        let overview = report.overview.as_ref().and_then(Section::ready).unwrap();

        assert!(overview.kpis.mean_rt_raw.is_finite());
        let rt_raw = overview.summary.iter().find(|s| s.column == "rt_raw").unwrap();
        assert_eq!(rt_raw.count, 24);
        // The blank row fails the strict bounds
        assert_eq!(overview.outliers.kept + overview.outliers.removed, 25);
        assert!(overview.distributions[0].qq.is_some());
    }

    #[test]
    fn test_outlier_summary_counts_rows() {
        let (_tmp, config) = setup(false);
        let config = Config {
            outliers: crate::core::config::OutlierConfig {
                high: 500.0,
                ..Default::default()
            },
            ..config
        };
        let mut cache = DatasetCache::new();
        let report = Pipeline::new(&config, &mut cache).run();
        let overview = report.overview.as_ref().and_then(Section::ready).unwrap();
        assert_eq!(overview.outliers.kept + overview.outliers.removed, 24);
        assert!(overview.outliers.removed > 0);
        assert!(!overview.outliers.applied);
    }
}
