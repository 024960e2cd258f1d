//! Sandpit - sandboxed script playground
//!
//! Main entry point for the sandpit CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sandpit_config::LoggingSection;
use tracing_appender::non_blocking::WorkerGuard;

mod commands;

use commands::{run, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Sandpit - sandboxed script playground
#[derive(Parser)]
#[command(name = "sandpit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file (overrides default discovery)
    #[arg(long = "config-file", global = true, env = "SANDPIT_CONFIG")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the playground server
    Start(start::StartArgs),

    /// Run a script file locally
    Run(run::RunArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = commands::load(cli.config_file.as_deref())?;
    let _log_guard = init_logging(&loaded.config.logging(), cli.verbose);

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        config: loaded.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Run(args) => run::run(args, &ctx).await,
    }
}

/// Initialize tracing: console layer, plus a daily-rotated JSON file when
/// `logging.file_dir` is set.
///
/// `RUST_LOG` wins over `logging.filter`, which wins over the defaults.
/// The returned guard must be held until exit so buffered file logs flush.
fn init_logging(logging: &LoggingSection, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_filter = if verbose {
        "sandpit=debug,sandpit_server=debug,sandpit_script=debug,sandpit_dataset=debug,sandpit_config=debug,info"
    } else {
        "sandpit=info,sandpit_server=info,sandpit_script=info,sandpit_dataset=info,warn"
    };
    let filter = || {
        EnvFilter::try_from_default_env()
            .ok()
            .or_else(|| logging.filter.as_deref().and_then(|f| EnvFilter::try_new(f).ok()))
            .unwrap_or_else(|| EnvFilter::new(default_filter))
    };

    // Console logs go to stderr so `sandpit run` output stays clean.
    let console = if logging.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    };

    let (file, guard) = match &logging.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sandpit.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file).init();
    guard
}
