//! Plankifier - describe and submit the plankton classification workflow
//!
//! Main entry point for the plankifier CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, generate, plan, show};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Plankifier - Pegasus pipeline workflow for plankton classification
#[derive(Parser)]
#[command(name = "plankifier")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Extra config file, applied over user and project config
    #[arg(long, global = true, env = "PLANKIFIER_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the properties, catalogs, and workflow without planning
    Generate(generate::GenerateArgs),

    /// Write everything, then plan and submit with pegasus-plan
    Plan(plan::PlanArgs),

    /// Print the job DAG
    Show(show::ShowArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + daily JSON file
    let filter = if cli.verbose {
        "plankifier=debug,plankifier_pipeline=debug,plankifier_config=debug,info"
    } else {
        "plankifier=info,plankifier_pipeline=info,plankifier_config=info,warn"
    };

    let log_dir = plankifier_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "plankifier.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "plankifier=trace,plankifier_pipeline=trace,plankifier_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_path: cli.config,
    };

    match cli.command {
        Commands::Generate(args) => generate::run(args, &ctx),
        Commands::Plan(args) => plan::run(args, &ctx).await,
        Commands::Show(args) => show::run(args, &ctx),
        Commands::Config(args) => config::run(args, &ctx),
    }
}
