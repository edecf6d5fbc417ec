//! Show command - prints the job DAG without writing anything.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use plankifier_pipeline::Dependency;
use serde::Serialize;

use super::{CatalogArgs, Context, prepare};

/// Arguments for the show command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,
}

#[derive(Debug, Serialize)]
struct JobSummary {
    id: String,
    transformation: String,
    arguments: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    profiles: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    workflow: String,
    execution_site: String,
    jobs: Vec<JobSummary>,
    dependencies: Vec<Dependency>,
}

/// Run the show command.
pub fn run(args: ShowArgs, ctx: &Context) -> Result<()> {
    let mut prepared = prepare(&args.catalog, ctx)?;
    let workflow = prepared.pipeline.create_workflow()?;
    workflow.validate()?;

    let jobs: Vec<JobSummary> = workflow
        .topological_order()?
        .into_iter()
        .map(|job| JobSummary {
            id: job.id.clone(),
            transformation: job.name.clone(),
            arguments: job.command_line(),
            inputs: job.inputs().map(String::from).collect(),
            outputs: job.outputs().map(String::from).collect(),
            profiles: job
                .profiles
                .iter()
                .map(|(ns, key, value)| format!("{ns}.{key} = {value}"))
                .collect(),
        })
        .collect();
    let output = ShowOutput {
        workflow: workflow.name().to_string(),
        execution_site: prepared.exec_site.clone(),
        jobs,
        dependencies: workflow.dependency_list(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let cyan = Style::new().cyan();

    println!();
    println!("{}", style(&output.workflow).bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("Execution site:"), output.execution_site);
    println!();
    for job in &output.jobs {
        println!("  {} {}", cyan.apply_to(&job.id), style(&job.transformation).bold());
        if !job.arguments.is_empty() {
            println!("    {} {}", dim.apply_to("args:"), job.arguments);
        }
        if !job.inputs.is_empty() {
            println!("    {} {}", dim.apply_to("in:"), job.inputs.join(", "));
        }
        if !job.outputs.is_empty() {
            println!("    {} {}", dim.apply_to("out:"), job.outputs.join(", "));
        }
        for profile in &job.profiles {
            println!("    {} {}", dim.apply_to("profile:"), profile);
        }
    }
    if !output.dependencies.is_empty() {
        println!();
        for dep in &output.dependencies {
            println!("  {} → {}", dep.id, dep.children.join(", "));
        }
    }
    println!();

    Ok(())
}
