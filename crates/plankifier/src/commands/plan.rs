//! Plan command - writes everything and hands the workflow to pegasus-plan.

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use plankifier_pipeline::{Planner, PlannerOptions};
use serde::Serialize;

use super::{CatalogArgs, Context, create_all, prepare};

/// Arguments for the plan command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Planner executable
    #[arg(long, env = "PEGASUS_PLAN", value_name = "PATH")]
    pub planner: Option<String>,

    /// Plan only; do not submit to HTCondor
    #[arg(long)]
    pub no_submit: bool,

    /// Kill the planner after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Plan result for JSON output.
#[derive(Debug, Serialize)]
struct PlanOutput {
    workflow: String,
    submitted: bool,
    submit_dir: Option<String>,
}

/// Run the plan command.
pub async fn run(args: PlanArgs, ctx: &Context) -> Result<()> {
    let mut prepared = prepare(&args.catalog, ctx)?;
    create_all(&mut prepared, args.catalog.skip_sites_catalog, ctx)?;
    prepared.pipeline.write()?;

    let mut options = PlannerOptions::from_config(&prepared.config.planner(), &prepared.exec_site);
    if let Some(planner) = args.planner {
        options = options.with_executable(planner);
    }
    if args.no_submit {
        options = options.with_submit(false);
    }
    if let Some(secs) = args.timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }
    let planner = Planner::new(options);

    let outcome = prepared
        .pipeline
        .plan(&planner)
        .await
        .context("planning failed")?;

    if ctx.json_output {
        let output = PlanOutput {
            workflow: prepared.pipeline.name(),
            submitted: outcome.submitted,
            submit_dir: outcome.submit_dir.as_ref().map(|d| d.display().to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    let dim = Style::new().dim();

    if ctx.verbose && !outcome.stdout.trim().is_empty() {
        println!();
        println!("{}", dim.apply_to(outcome.stdout.trim_end()));
    }

    println!();
    if outcome.submitted {
        println!("{}", style("Workflow submitted").bold());
    } else {
        println!("{}", style("Workflow planned").bold());
    }
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("Workflow:"), prepared.pipeline.name());
    match outcome.submit_dir {
        Some(ref dir) => {
            println!("  {} {}", dim.apply_to("Submit dir:"), green.apply_to(dir.display()));
            println!();
            if outcome.submitted {
                println!(
                    "  {}",
                    dim.apply_to(format!("Monitor with: pegasus-status -l {}", dir.display()))
                );
            } else {
                println!(
                    "  {}",
                    dim.apply_to(format!("Submit with: pegasus-run {}", dir.display()))
                );
            }
        }
        None => println!("  {} unknown", dim.apply_to("Submit dir:")),
    }
    println!();

    Ok(())
}
