//! Value enums for CLI selections
//!
//! These map command-line choices onto core types so the core stays free
//! of argument-parsing concerns.

use clap::ValueEnum;

use crate::core::pipeline::DatasetKind;
use crate::render::View;

/// Dataset selection
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum DatasetFilter {
    /// Behavioral reaction times (dependent variable rt_log)
    #[default]
    Behavioral,
    /// Object-sensitive MVPA measure (dependent variable value)
    Mvpa,
    /// Searchlight measure (dependent variable value)
    Searchlight,
}

impl From<DatasetFilter> for DatasetKind {
    fn from(filter: DatasetFilter) -> Self {
        match filter {
            DatasetFilter::Behavioral => DatasetKind::Behavioral,
            DatasetFilter::Mvpa => DatasetKind::Mvpa,
            DatasetFilter::Searchlight => DatasetKind::Searchlight,
        }
    }
}

impl std::fmt::Display for DatasetFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", DatasetKind::from(*self))
    }
}

/// Report tab selection
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum ViewFilter {
    /// Every tab - default
    #[default]
    All,
    /// KPIs, summary, design balance and distributions
    Overview,
    /// Cell statistics and the interaction chart
    Interaction,
    /// Behavioral ANOVA
    Behavioral,
    /// MVPA ANOVA
    Mvpa,
    /// Searchlight ANOVA
    Searchlight,
}

impl From<ViewFilter> for View {
    fn from(filter: ViewFilter) -> Self {
        match filter {
            ViewFilter::All => View::All,
            ViewFilter::Overview => View::Overview,
            ViewFilter::Interaction => View::Interaction,
            ViewFilter::Behavioral => View::Dataset(DatasetKind::Behavioral),
            ViewFilter::Mvpa => View::Dataset(DatasetKind::Mvpa),
            ViewFilter::Searchlight => View::Dataset(DatasetKind::Searchlight),
        }
    }
}
