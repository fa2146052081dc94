//! Command-line argument definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    anova::AnovaArgs, clean::CleanArgs, completions::CompletionsArgs, config::ConfigCommands,
    describe::DescribeArgs, report::ReportArgs, residuals::ResidualsArgs,
};

#[derive(Parser, Debug)]
#[command(name = "wit")]
#[command(author, version, about = "Repeated-measures analysis of weapon identification task data")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Config file (default: ./wit.yaml, then the user config directory)
    #[arg(long, global = true, env = "WIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the dataset CSV files (overrides config)
    #[arg(long, short = 'd', global = true, env = "WIT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "terminal")]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable histograms and braille charts in terminal output
    #[arg(long, global = true)]
    pub no_charts: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the full analysis report (all tabs by default)
    Report(ReportArgs),

    /// Run the repeated-measures ANOVA on one dataset
    Anova(AnovaArgs),

    /// Descriptive statistics, optionally grouped by factors
    Describe(DescribeArgs),

    /// Write model residuals of one dataset as CSV
    Residuals(ResidualsArgs),

    /// Repair the value column of a neuro CSV and write it to stdout
    Clean(CleanArgs),

    /// Show or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Output format for reports and tables
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Styled tables and charts
    #[default]
    Terminal,
    /// GitHub-flavored Markdown
    Markdown,
    /// JSON document
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Terminal => write!(f, "terminal"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
