//! `wit describe` command - descriptive statistics

use miette::{IntoDiagnostic, Result};

use crate::cli::filters::DatasetFilter;
use crate::cli::helpers::load_config;
use crate::cli::output::emit;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::pipeline::{DatasetKind, FACTOR_A, FACTOR_B};
use crate::core::{describe, design_balance, group_stats, DatasetCache, Pipeline};
use crate::render::terminal::{balance_table, group_table, summary_table};
use crate::render::TableStyle;

#[derive(clap::Args, Debug)]
pub struct DescribeArgs {
    /// Dataset to summarise
    #[arg(long, default_value = "behavioral")]
    pub dataset: DatasetFilter,

    /// Group by these columns (comma-separated, e.g. prime,target)
    #[arg(long, value_delimiter = ',')]
    pub by: Vec<String>,

    /// Value column for grouped statistics (default: the dataset's DV)
    #[arg(long)]
    pub column: Option<String>,
}

pub fn run(args: DescribeArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global)?;
    let mut cache = DatasetCache::new();
    let kind = DatasetKind::from(args.dataset);
    let table = Pipeline::new(&config, &mut cache)
        .dataset(kind)
        .into_diagnostic()?;

    let style = match global.format {
        OutputFormat::Markdown => TableStyle::Markdown,
        _ => TableStyle::Rounded,
    };

    let text = if args.by.is_empty() {
        let summary = describe(&table);
        let balance = design_balance(&table, FACTOR_A, FACTOR_B).into_diagnostic()?;
        match global.format {
            OutputFormat::Json => {
                let value = serde_json::json!({ "summary": summary, "balance": balance });
                serde_json::to_string_pretty(&value).into_diagnostic()?
            }
            _ => format!(
                "{}\n\n{}",
                summary_table(&summary, style),
                balance_table(&balance, style)
            ),
        }
    } else {
        let by: Vec<&str> = args.by.iter().map(String::as_str).collect();
        let column = args.column.as_deref().unwrap_or(kind.dv());
        let stats = group_stats(&table, &by, column).into_diagnostic()?;
        match global.format {
            OutputFormat::Json => serde_json::to_string_pretty(&stats).into_diagnostic()?,
            _ => group_table(&stats, style),
        }
    };

    emit(&format!("{}\n", text), None)
}
