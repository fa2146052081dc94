//! Output formatting utilities

use miette::{IntoDiagnostic, Result};
use std::io::Write;
use std::path::Path;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::render::{JsonRenderer, MarkdownRenderer, Renderer, TerminalRenderer};

/// Renderer for the selected output format
pub fn renderer_for(global: &GlobalOpts) -> Box<dyn Renderer> {
    match global.format {
        OutputFormat::Terminal => Box::new(TerminalRenderer::new(!global.no_charts)),
        OutputFormat::Markdown => Box::new(MarkdownRenderer),
        OutputFormat::Json => Box::new(JsonRenderer { pretty: true }),
    }
}

/// Write rendered text to a file, or to stdout when no path is given
pub fn emit(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            // Styling codes do not belong in files
            let plain = console::strip_ansi_codes(text);
            std::fs::write(path, plain.as_bytes()).into_diagnostic()?;
            log::info!("wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes()).into_diagnostic()?;
            stdout.flush().into_diagnostic()?;
        }
    }
    Ok(())
}
