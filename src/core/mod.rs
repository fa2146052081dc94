//! Core module - data handling and statistics

pub mod anova;
pub mod clean;
pub mod config;
pub mod describe;
pub mod diagnostics;
pub mod loader;
pub mod pipeline;
pub mod table;

pub use anova::{rm_anova, significance_stars, AnovaRow, AnovaTable, DesignError, SourceKind};
pub use clean::{clean_neuro_value, filter_outliers, repair_numeric_text, CleanError, ParseError};
pub use config::{Config, ConfigError};
pub use describe::{describe, design_balance, group_stats, histogram, kpis};
pub use diagnostics::{
    assess, homogeneity_test, normality_test, qq_points, residual_groups, residuals,
    DiagnosticError, LeveneCenter, TestResult, Verdict,
};
pub use loader::{DatasetCache, LoadError, Loaded};
pub use pipeline::{DatasetKind, Pipeline, PipelineError, Report, Section};
pub use table::{Column, ColumnError, DataTable, Factor};
