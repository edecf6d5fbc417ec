//! Generate command - writes the catalogs and workflow for pegasus-plan.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::{CatalogArgs, Context, create_all, prepare};

/// Arguments for the generate command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,
}

/// Written files for JSON output.
#[derive(Debug, Serialize)]
struct GenerateOutput {
    workflow: String,
    work_dir: String,
    files: Vec<String>,
}

/// Run the generate command.
pub fn run(args: GenerateArgs, ctx: &Context) -> Result<()> {
    let mut prepared = prepare(&args.catalog, ctx)?;
    create_all(&mut prepared, args.catalog.skip_sites_catalog, ctx)?;
    let written = prepared.pipeline.write()?;

    if ctx.json_output {
        let output = GenerateOutput {
            workflow: prepared.pipeline.name(),
            work_dir: prepared.pipeline.work_dir().display().to_string(),
            files: written
                .paths()
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let green = Style::new().green();
        let dim = Style::new().dim();
        println!();
        for path in written.paths() {
            println!("  {} {}", green.apply_to("✓"), path.display());
        }
        println!();
        println!(
            "  {}",
            dim.apply_to(format!(
                "Plan with: plankifier plan --dir {}",
                prepared.pipeline.work_dir().display()
            ))
        );
        println!();
    }

    Ok(())
}
