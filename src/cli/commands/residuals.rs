//! `wit residuals` command - model residuals as CSV

use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::filters::DatasetFilter;
use crate::cli::helpers::load_config;
use crate::cli::output::emit;
use crate::cli::GlobalOpts;
use crate::core::pipeline::{DatasetKind, FACTOR_A, FACTOR_B, SUBJECT};
use crate::core::{residuals, Column, DataTable, DatasetCache, Pipeline};

#[derive(clap::Args, Debug)]
pub struct ResidualsArgs {
    /// Dataset whose ANOVA residuals to compute
    #[arg(long, default_value = "behavioral")]
    pub dataset: DatasetFilter,

    /// Write the CSV to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: ResidualsArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let mut cache = DatasetCache::new();
    let kind = DatasetKind::from(args.dataset);
    let table = Pipeline::new(&config, &mut cache)
        .analysis_table(kind)
        .into_diagnostic()?;

    let dv = kind.dv();
    let res = residuals(&table, dv, SUBJECT, FACTOR_A, FACTOR_B).into_diagnostic()?;

    let mut out = DataTable::empty();
    for name in [SUBJECT, FACTOR_A, FACTOR_B, dv] {
        out.insert(name, table.column(name).into_diagnostic()?.clone())
            .into_diagnostic()?;
    }
    out.insert("residual", Column::Numeric(res))
        .into_diagnostic()?;

    let csv = out.to_csv().into_diagnostic()?;
    emit(&csv, args.output.as_deref())
}
