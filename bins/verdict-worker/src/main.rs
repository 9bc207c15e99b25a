mod browser;
mod config;
mod discovery;
mod engine;
mod error;
mod evaluator;
mod executor;
mod probe;
mod scheduler;


use anyhow::{bail, Result};
use browser::{BrowserProbe, ChromiumHost};
use clap::{Parser, Subcommand};
use config::{HarnessConfig, DEFAULT_CONFIG_PATH};
use engine::ProcessEngine;
use probe::ProbeStrategy;
use scheduler::TaskScheduler;
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use verdict_common::report::{save_report, DEFAULT_REPORT_PATH};
use verdict_common::types::Conclusion;

#[derive(Parser)]
#[command(name = "verdict-worker")]
#[command(about = "Run Stella typechecker implementations against a test corpus", long_about = None)]
struct Cli {
    /// Harness configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Maximum number of tests in flight (defaults to available cores)
    #[arg(short = 'j', long, global = true)]
    parallelism: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test a typechecker against .stella files and their .out oracles
    Test {
        /// Directory with .stella files and reference .out files
        tests_path: PathBuf,

        /// Typechecker command to execute
        #[arg(long)]
        cmd: String,

        /// Arguments for the command
        #[arg(long, num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,

        /// Where to save the report
        #[arg(short, long, default_value = DEFAULT_REPORT_PATH)]
        out: PathBuf,
    },

    /// Typecheck .stella files with the reference interpreter and write .out files
    Generate {
        /// Directory with .stella files
        tests_path: PathBuf,

        /// Delete generated output files instead
        #[arg(short, long, default_value = "false")]
        clean: bool,

        /// Probe strategy used to detect type errors
        #[arg(long, value_enum)]
        strategy: Option<ProbeStrategy>,

        /// Path to the bundled reference interpreter
        #[arg(long)]
        interpreter: Option<PathBuf>,

        /// Poll the harness until its deadline instead of a fixed attempt budget
        #[arg(long, default_value = "false")]
        unbounded_polling: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    let mut config = HarnessConfig::load_or_default(&cli.config).map_err(|e| {
        error!("Failed to load harness configuration: {:#}", e);
        e
    })?;
    if let Some(parallelism) = cli.parallelism {
        if parallelism == 0 {
            bail!("--parallelism must be at least 1");
        }
        config.parallelism = Some(parallelism);
    }

    match cli.command {
        Commands::Test {
            tests_path,
            cmd,
            args,
            out,
        } => test_typechecker(&config, &tests_path, cmd, args, &out).await,
        Commands::Generate {
            tests_path,
            clean,
            strategy,
            interpreter,
            unbounded_polling,
        } => {
            if clean {
                let removed = executor::clean_oracles(&tests_path, &config.oracle_suffix).await?;
                info!("{} files deleted.", removed);
                return Ok(());
            }

            if let Some(strategy) = strategy {
                config.probe.strategy = strategy;
            }
            if let Some(interpreter) = interpreter {
                config.probe.interpreter_script = interpreter;
            }
            if unbounded_polling {
                config.probe.max_poll_attempts = None;
            }
            generate_references(&config, &tests_path).await
        }
    }
}

async fn test_typechecker(
    config: &HarnessConfig,
    tests_path: &Path,
    cmd: String,
    args: Vec<String>,
    out: &Path,
) -> Result<()> {
    let tests = discovery::discover(tests_path, &config.source_extension, &config.oracle_suffix)?;
    info!("Testing typechecker with {} Stella files...", tests.len());

    let engine = ProcessEngine::new(cmd, args).with_timeout(config.command_timeout());
    let scheduler = TaskScheduler::new(config.parallelism());

    let (report, summary) = tokio::select! {
        outcome = executor::run_test_suite(&tests, &engine, scheduler) => outcome,
        _ = signal::ctrl_c() => {
            bail!("Interrupted, report not written");
        }
    };

    save_report(out, &report)?;
    info!(report = %out.display(), "Report saved");

    for conclusion in Conclusion::ALL {
        info!("{}: {}", conclusion, summary.count(conclusion));
    }
    if summary.skipped > 0 {
        warn!("{} tests skipped", summary.skipped);
    }
    info!("Total: {}/{}", summary.correct, summary.total());

    Ok(())
}

async fn generate_references(config: &HarnessConfig, tests_path: &Path) -> Result<()> {
    let tests = discovery::discover(tests_path, &config.source_extension, &config.oracle_suffix)?;
    info!(
        strategy = ?config.probe.strategy,
        "Found {} Stella files, typechecking...",
        tests.len()
    );

    // Before launching, so a missing bundle never leaves a browser behind
    browser::interpreter_url(&config.probe.interpreter_script)?;
    let host = ChromiumHost::launch(config.probe.no_sandbox).await?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling probes...");
            let _ = cancel_tx.send(true);
        }
    });

    let probe = match BrowserProbe::new(host, config.probe.clone()) {
        Ok(probe) => probe.with_cancellation(cancel_rx),
        Err(e) => {
            interrupt.abort();
            return Err(e);
        }
    };

    let scheduler = TaskScheduler::new(config.parallelism());
    let stats = executor::generate_suite(&tests, &probe, scheduler).await;
    interrupt.abort();

    probe.into_host().shutdown().await?;

    info!(
        well_typed = stats.well_typed,
        ill_typed = stats.ill_typed,
        failed = stats.failed,
        "Reference outputs generated"
    );
    if stats.failed > 0 {
        warn!("{} tests skipped", stats.failed);
    }

    Ok(())
}
