use anyhow::{Context, Result};
use clap::Parser;
use salmon_lines::config::AnalysisConfig;
use salmon_lines::shell::AnalysisShell;
use salmon_lines::tree::MoveTree;
use salmon_lines::validator::StandardRules;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Step through, branch, import and export chess games from the terminal.
#[derive(Parser)]
#[command(name = "salmon-lines")]
#[command(about = "Interactive chess move tree with variations")]
#[command(version)]
struct Args {
    /// Start from this FEN instead of the standard position
    #[arg(long, value_name = "FEN")]
    fen: Option<String>,

    /// Load the main line from a PGN file
    #[arg(long, value_name = "FILE")]
    pgn: Option<PathBuf>,

    /// Name stem for new variations
    #[arg(long, default_value = "Variation")]
    variation_prefix: String,

    /// Log filter, e.g. "debug" or "salmon_lines=info" (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log {
        Some(filter) => EnvFilter::try_new(filter).context("invalid --log filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut config = AnalysisConfig::new().with_variation_prefix(args.variation_prefix);
    if let Some(fen) = args.fen {
        config = config.with_start_position(fen);
    }
    let mut tree = MoveTree::with_config(config, StandardRules).context("invalid --fen")?;

    if let Some(path) = &args.pgn {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        tree.load_pgn(&text)
            .with_context(|| format!("failed to import {}", path.display()))?;
    }

    let mut shell = AnalysisShell::with_tree(tree);
    let stdin = io::stdin();
    shell.run(stdin.lock(), io::stdout())
}
