//! CLI command implementations

pub mod anova;
pub mod clean;
pub mod completions;
pub mod config;
pub mod describe;
pub mod report;
pub mod residuals;
