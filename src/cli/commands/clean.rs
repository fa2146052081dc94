//! `wit clean` command - repair a neuro CSV

use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::output::emit;
use crate::cli::GlobalOpts;
use crate::core::{clean_neuro_value, DatasetCache, LoadError};

#[derive(clap::Args, Debug)]
pub struct CleanArgs {
    /// CSV file with a free-text `value` column
    pub file: PathBuf,

    /// Write the repaired CSV to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: CleanArgs, _global: &GlobalOpts) -> Result<()> {
    let mut cache = DatasetCache::new();
    let loaded = cache.load(&args.file).into_diagnostic()?;
    if loaded.is_missing() {
        return Err(LoadError::NotFound { path: args.file }).into_diagnostic();
    }

    let cleaned = clean_neuro_value(&loaded.table).into_diagnostic()?;
    log::info!(
        "repaired {} rows of {}",
        cleaned.n_rows(),
        args.file.display()
    );
    let csv = cleaned.to_csv().into_diagnostic()?;
    emit(&csv, args.output.as_deref())
}
