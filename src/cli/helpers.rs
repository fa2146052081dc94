//! Shared helper functions for CLI commands

use log::LevelFilter;
use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::Config;

/// Log level for a `-v` count
pub fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the stderr logger
///
/// `RUST_LOG` takes precedence over the `-v` count.
pub fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level_for(verbose));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format_timestamp(None).format_target(false);
    // A logger may already be installed when running under a test harness
    let _ = builder.try_init();
}

/// Resolve the configuration and apply command-line overrides
pub fn load_config(global: &GlobalOpts) -> Result<Config> {
    let mut config = Config::load(global.config.as_deref()).into_diagnostic()?;
    if let Some(dir) = &global.data_dir {
        config.data_dir = dir.clone();
    }
    log::debug!("data directory: {}", config.data_dir.display());
    Ok(config)
}
