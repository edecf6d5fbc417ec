//! `pegasus-plan` invocation.
//!
//! The planner is spawned in the work directory, so the catalogs written
//! there (`sites.yml`, `transformations.yml`) are picked up by their default
//! names.
//!
//! **stdout**: with `--json`, a JSON object carrying `submit_dir`; otherwise
//! a human-readable report ending in a `pegasus-run <submit dir>` hint.
//!
//! **stderr**: captured and logged via tracing.
//!
//! **exit code**: non-zero is treated as an error.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use plankifier_config::{CleanupMode, PlannerConfig};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::properties::PROPERTIES_FILE;

/// Flags passed to the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerOptions {
    /// Planner executable (looked up on `PATH` when not absolute).
    pub executable: String,
    /// Properties file, relative to the work directory.
    pub conf: PathBuf,
    /// Execution sites.
    pub sites: Vec<String>,
    /// Sites receiving staged-out outputs.
    pub output_sites: Vec<String>,
    pub cleanup: CleanupMode,
    /// Base submit directory.
    pub dir: Option<PathBuf>,
    /// Submit to HTCondor after planning.
    pub submit: bool,
    /// Ask for machine-readable output.
    pub json: bool,
    /// Kill the planner after this long.
    pub timeout: Option<Duration>,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self::from_config(&PlannerConfig::default(), "condorpool")
    }
}

impl PlannerOptions {
    /// Build options from the `[planner]` section for one execution site.
    pub fn from_config(config: &PlannerConfig, execution_site: &str) -> Self {
        Self {
            executable: config.executable.clone(),
            conf: PathBuf::from(PROPERTIES_FILE),
            sites: vec![execution_site.to_string()],
            output_sites: config.output_sites.clone(),
            cleanup: config.cleanup,
            dir: config.submit_dir.as_ref().map(PathBuf::from),
            submit: config.submit,
            json: true,
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_submit(mut self, submit: bool) -> Self {
        self.submit = submit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What the planner reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Submit directory holding the generated HTCondor DAG.
    pub submit_dir: Option<PathBuf>,
    /// Whether the workflow was handed to HTCondor.
    pub submitted: bool,
    /// Raw planner stdout.
    pub stdout: String,
}

/// Runs `pegasus-plan` on a written workflow.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    options: PlannerOptions,
}

impl Planner {
    pub fn new(options: PlannerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Command-line arguments for planning `workflow_file`.
    pub fn build_args(&self, workflow_file: &Path) -> Vec<String> {
        let opts = &self.options;
        let mut args = vec![
            "--conf".to_string(),
            opts.conf.display().to_string(),
        ];
        if !opts.sites.is_empty() {
            args.push("--sites".to_string());
            args.push(opts.sites.join(","));
        }
        if !opts.output_sites.is_empty() {
            args.push("--output-sites".to_string());
            args.push(opts.output_sites.join(","));
        }
        args.push("--cleanup".to_string());
        args.push(opts.cleanup.to_string());
        if let Some(ref dir) = opts.dir {
            args.push("--dir".to_string());
            args.push(dir.display().to_string());
        }
        if opts.json {
            args.push("--json".to_string());
        }
        if opts.submit {
            args.push("--submit".to_string());
        }
        args.push(workflow_file.display().to_string());
        args
    }

    /// Plan (and optionally submit) `workflow_file` from `work_dir`.
    pub async fn plan(&self, workflow_file: &Path, work_dir: &Path) -> Result<PlanOutcome> {
        let args = self.build_args(workflow_file);
        info!(
            executable = %self.options.executable,
            args = %args.join(" "),
            dir = %work_dir.display(),
            "running planner"
        );

        let child = tokio::process::Command::new(&self.options.executable)
            .args(&args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::PlannerSpawn {
                executable: self.options.executable.clone(),
                source: e,
            })?;

        let output = match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| PipelineError::PlannerTimeout(limit))??,
            None => child.wait_with_output().await?,
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(stderr = %stderr.trim(), "planner stderr");
        }

        if !output.status.success() {
            return Err(PipelineError::PlannerFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(stdout = %stdout.trim(), "planner stdout");

        let submit_dir = parse_submit_dir(&stdout);
        match submit_dir {
            Some(ref dir) => info!(submit_dir = %dir.display(), submitted = self.options.submit, "planned workflow"),
            None => warn!("planner did not report a submit directory"),
        }

        Ok(PlanOutcome {
            submit_dir,
            submitted: self.options.submit,
            stdout,
        })
    }
}

/// Extract the submit directory from planner output.
///
/// Prefers the `submit_dir` field of the first JSON object in the output,
/// then the path following a `pegasus-run` hint.
pub fn parse_submit_dir(stdout: &str) -> Option<PathBuf> {
    if let Some(start) = stdout.find('{') {
        let mut values =
            serde_json::Deserializer::from_str(&stdout[start..]).into_iter::<serde_json::Value>();
        if let Some(Ok(value)) = values.next()
            && let Some(dir) = value.get("submit_dir").and_then(|d| d.as_str())
        {
            return Some(PathBuf::from(dir));
        }
    }

    stdout.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        tokens.find(|t| *t == "pegasus-run")?;
        tokens.last().map(PathBuf::from)
    })
}
