//! `wit config` command - inspect and create configuration

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::load_config;
use crate::cli::GlobalOpts;
use crate::core::config::LOCAL_CONFIG_FILE;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration as YAML
    Show,

    /// Write a config file with the default values
    Init(InitArgs),

    /// Print the config file locations that are searched
    Path,
}

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Write to the user config directory instead of ./wit.yaml
    #[arg(long)]
    pub user: bool,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show => run_show(global),
        ConfigCommands::Init(args) => run_init(args),
        ConfigCommands::Path => run_path(),
    }
}

fn run_show(global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    print!("{}", config.to_yaml().into_diagnostic()?);
    Ok(())
}

fn run_init(args: InitArgs) -> Result<()> {
    let path = if args.user {
        Config::user_config_path()
            .ok_or_else(|| miette::miette!("Cannot determine the user config directory"))?
    } else {
        PathBuf::from(LOCAL_CONFIG_FILE)
    };

    if path.exists() && !args.force {
        return Err(miette::miette!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }

    let yaml = Config::default().to_yaml().into_diagnostic()?;
    std::fs::write(&path, yaml).into_diagnostic()?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(path.display()).cyan()
    );
    Ok(())
}

fn run_path() -> Result<()> {
    println!("{}", LOCAL_CONFIG_FILE);
    match Config::user_config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("{}", style("(no user config directory)").dim()),
    }
    Ok(())
}
