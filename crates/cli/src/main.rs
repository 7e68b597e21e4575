//! Node pool advisor CLI
//!
//! A command-line tool for sizing managed Kubernetes node pools from
//! observed utilization, estimating savings, and summarizing past runs.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analyze, show_config, summarize};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Node pool capacity and cost advisor
#[derive(Parser)]
#[command(name = "pool-advisor")]
#[command(author, version, about = "Node pool capacity and cost advisor", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze node pools and report sizing and savings opportunities
    Analyze(config::AnalyzeArgs),

    /// Re-aggregate one or more persisted issues.json files
    Summarize {
        /// issues.json files written by `analyze --output-dir`
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Number of top opportunities to list
        #[arg(long, default_value_t = advisor_lib::DEFAULT_TOP_N)]
        top: usize,
    },

    /// Print the effective policy after files, environment and flags
    ShowConfig(config::PolicyArgs),
}

/// Logs go to stderr so JSON on stdout stays machine-readable
fn init_tracing(format: output::OutputFormat, verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        output::OutputFormat::Table if verbose => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.format, cli.verbose);

    match cli.command {
        Commands::Analyze(args) => {
            analyze::run(args, cli.format).await?;
        }
        Commands::Summarize { files, top } => {
            summarize::run(&files, top, cli.format).await?;
        }
        Commands::ShowConfig(args) => {
            show_config::run(&args, cli.format)?;
        }
    }

    Ok(())
}
