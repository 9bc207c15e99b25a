mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "verdict-cli")]
#[command(about = "Verdict CLI - Inspect typechecker test reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a report produced by `verdict-worker test`
    Print {
        /// Path to the report
        report_path: PathBuf,

        /// Only list tests with this conclusion
        #[arg(short, long)]
        only: Option<String>,
    },
}

fn main() -> Result<()> {
    // stdout carries the rendered report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Print { report_path, only } => {
            commands::print_report(&report_path, only.as_deref()).map_err(|e| {
                error!("Failed to print report {}: {:#}", report_path.display(), e);
                e
            })?;
        }
    }

    Ok(())
}
