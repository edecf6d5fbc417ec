//! Configuration system for the plankifier workflow generator.
//!
//! Provides TOML-based configuration with:
//! - Per-job sections (`[plankifier]`, `[count]`) describing arguments and executables
//! - Site layout (`[sites]`) and the Pegasus worker package (`[worker]`)
//! - Planner invocation settings (`[planner]`) and raw Pegasus `[properties]`
//! - Config file layering (user config + project-local + explicit file)
//!
//! Every field defaults to the value the pipeline was originally deployed
//! with, so an empty config reproduces the stock workflow.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, config_dir, load_config_file, load_config_with_options,
    user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
