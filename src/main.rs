use clap::Parser;
use miette::Result;
use wit::cli::helpers::init_logging;
use wit::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Install miette's fancy error handler for readable diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let global = &cli.global;
    match cli.command {
        Commands::Report(args) => wit::cli::commands::report::run(args, global),
        Commands::Anova(args) => wit::cli::commands::anova::run(args, global),
        Commands::Describe(args) => wit::cli::commands::describe::run(args, global),
        Commands::Residuals(args) => wit::cli::commands::residuals::run(args, global),
        Commands::Clean(args) => wit::cli::commands::clean::run(args, global),
        Commands::Config(cmd) => wit::cli::commands::config::run(cmd, global),
        Commands::Completions(args) => wit::cli::commands::completions::run(args),
    }
}
