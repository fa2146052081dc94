//! `wit report` command - full analysis report

use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::filters::ViewFilter;
use crate::cli::helpers::load_config;
use crate::cli::output::{emit, renderer_for};
use crate::cli::GlobalOpts;
use crate::core::{DatasetCache, Pipeline};

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Tabs to include
    #[arg(long, default_value = "all")]
    pub view: ViewFilter,

    /// Write the report to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: ReportArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let mut cache = DatasetCache::new();
    let report = Pipeline::new(&config, &mut cache).run();

    let text = renderer_for(global)
        .render(&report, args.view.into())
        .into_diagnostic()?;
    emit(&text, args.output.as_deref())?;

    if report.stopped.is_some() {
        return Err(miette::miette!(
            "Report stopped: the behavioral dataset is required"
        ));
    }
    Ok(())
}
