//! CLI command handlers.

pub mod config;
pub mod generate;
pub mod plan;
pub mod show;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::Args;
use console::Style;
use plankifier_config::PlankifierConfig;
use plankifier_pipeline::PlankifierWorkflow;
use tracing::warn;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Explicit config file from `--config`.
    pub config_path: Option<PathBuf>,
}

/// Flags shared by every command that builds the workflow.
#[derive(Args, Debug, Clone, Default)]
pub struct CatalogArgs {
    /// Skip site catalog creation
    #[arg(short = 's', long, alias = "skip_sites_catalog")]
    pub skip_sites_catalog: bool,

    /// Execution site name (default: condorpool)
    #[arg(
        short = 'e',
        long,
        alias = "execution_site_name",
        value_name = "STR"
    )]
    pub execution_site_name: Option<String>,

    /// Output file (default: workflow.yml)
    #[arg(short = 'o', long, value_name = "STR")]
    pub output: Option<String>,

    /// Work directory for catalogs, scratch, and output (default: current directory)
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,
}

/// Config and pipeline resolved from flags and config files.
pub struct Prepared {
    pub config: PlankifierConfig,
    pub exec_site: String,
    pub pipeline: PlankifierWorkflow,
}

/// Load config for the work directory and set up the pipeline builder.
pub fn prepare(args: &CatalogArgs, ctx: &Context) -> Result<Prepared> {
    let work_dir = resolve_work_dir(args.dir.as_deref())?;
    let config = load_config(&work_dir, ctx)?;

    let exec_site = args
        .execution_site_name
        .clone()
        .unwrap_or_else(|| config.sites().execution_site);
    let local_site = config.sites().local_site;
    if exec_site == local_site {
        bail!(
            "execution site '{}' must differ from the local site '{}'",
            exec_site,
            local_site
        );
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.workflow().output);

    let pipeline = PlankifierWorkflow::new(config.clone(), work_dir, output);
    Ok(Prepared {
        config,
        exec_site,
        pipeline,
    })
}

/// Run every `create_*` step, announcing each one.
pub fn create_all(prepared: &mut Prepared, skip_sites: bool, ctx: &Context) -> Result<()> {
    let pipeline = &mut prepared.pipeline;

    if !skip_sites {
        step(ctx, "Creating execution sites...");
        pipeline.create_sites_catalog(&prepared.exec_site)?;
    }

    step(ctx, "Creating workflow properties...");
    pipeline.create_pegasus_properties()?;

    step(ctx, "Creating transformation catalog...");
    pipeline.create_transformation_catalog(&prepared.exec_site)?;

    step(ctx, "Creating pipeline workflow dag...");
    pipeline.create_workflow()?;

    Ok(())
}

pub fn load_config(work_dir: &Path, ctx: &Context) -> Result<PlankifierConfig> {
    let loaded = plankifier_config::load_config_with_options(
        Some(work_dir),
        None,
        ctx.config_path.as_deref(),
    )
    .context("failed to load configuration")?;
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }
    loaded
        .config
        .validate()
        .context("invalid configuration")?;
    Ok(loaded.config)
}

pub fn resolve_work_dir(dir: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let dir = match dir {
        Some(d) if d.is_absolute() => d.to_path_buf(),
        Some(d) => cwd.join(d),
        None => cwd,
    };
    Ok(std::path::absolute(&dir)?)
}

fn step(ctx: &Context, message: &str) {
    if !ctx.json_output {
        println!("{}", Style::new().dim().apply_to(message));
    }
}
