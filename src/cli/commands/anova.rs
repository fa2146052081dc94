//! `wit anova` command - repeated-measures ANOVA of one dataset

use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::filters::DatasetFilter;
use crate::cli::helpers::load_config;
use crate::cli::output::{emit, renderer_for};
use crate::cli::GlobalOpts;
use crate::core::{DatasetCache, Pipeline};

#[derive(clap::Args, Debug)]
pub struct AnovaArgs {
    /// Dataset to analyse
    #[arg(long, default_value = "behavioral")]
    pub dataset: DatasetFilter,

    /// Write the result to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: AnovaArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let mut cache = DatasetCache::new();
    let analysis = Pipeline::new(&config, &mut cache)
        .analyze(args.dataset.into())
        .into_diagnostic()?;

    let text = renderer_for(global)
        .render_analysis(&analysis, config.alpha)
        .into_diagnostic()?;
    emit(&text, args.output.as_deref())
}
