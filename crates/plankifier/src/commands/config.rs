//! Config command - configuration inspection.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use plankifier_config::PlankifierConfig;

use super::{Context, resolve_work_dir};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Work directory whose plankifier.toml is included (default: current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration with defaults filled in
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Write a config file populated with the defaults
    Init {
        /// Create project-local config (plankifier.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the user config file path
    Path,
}

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(args.dir, ctx),
        ConfigCommand::Which => cmd_which(args.dir, ctx),
        ConfigCommand::Init { local, force } => cmd_init(args.dir, local, force),
        ConfigCommand::Path => cmd_path(),
    }
}

fn load(dir: Option<PathBuf>, ctx: &Context) -> Result<plankifier_config::LoadedConfig> {
    let work_dir = resolve_work_dir(dir.as_deref())?;
    plankifier_config::load_config_with_options(Some(&work_dir), None, ctx.config_path.as_deref())
        .context("failed to load configuration")
}

fn cmd_show(dir: Option<PathBuf>, ctx: &Context) -> Result<()> {
    let loaded = load(dir, ctx)?;
    let resolved = loaded.config.resolved();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for source in &sources {
            println!("# {}", source.display());
        }
    }
    for w in &loaded.warnings {
        println!("# ⚠ {}", w);
    }
    if let Err(e) = resolved.validate() {
        println!("# ⚠ {}", e);
    }
    println!();
    print!("{}", resolved.to_toml()?);

    Ok(())
}

fn cmd_which(dir: Option<PathBuf>, ctx: &Context) -> Result<()> {
    let loaded = load(dir, ctx)?;

    if ctx.json_output {
        let sources: Vec<serde_json::Value> = loaded
            .sources
            .iter()
            .map(|s| {
                serde_json::json!({
                    "path": s.path.display().to_string(),
                    "loaded": s.loaded,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    println!("Config file search order (later overrides earlier):\n");
    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'plankifier config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

fn cmd_init(dir: Option<PathBuf>, local: bool, force: bool) -> Result<()> {
    let path = if local {
        resolve_work_dir(dir.as_deref())?.join("plankifier.toml")
    } else {
        match plankifier_config::user_config_path() {
            Some(path) => path,
            None => bail!("Could not determine config directory"),
        }
    };

    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let contents = PlankifierConfig::new().resolved().to_toml()?;
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("✓ Created {}", path.display());
    Ok(())
}

fn cmd_path() -> Result<()> {
    match plankifier_config::user_config_path() {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("Could not determine config directory"),
    }
    Ok(())
}
