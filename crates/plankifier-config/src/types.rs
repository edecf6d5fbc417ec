//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [workflow]      # workflow name, output file, dependency inference
//! [sites]         # execution site and local directory layout
//! [plankifier]    # classifier executable and arguments
//! [count]         # counting step executable and output
//! [worker]        # Pegasus worker package
//! [planner]       # pegasus-plan invocation
//! [properties]    # raw Pegasus properties
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged. Use the accessor methods to get a
/// section with defaults filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlankifierConfig {
    /// Workflow-level settings.
    pub workflow: Option<WorkflowConfig>,

    /// Site catalog layout.
    pub sites: Option<SitesConfig>,

    /// Classification job.
    pub plankifier: Option<PlankifierJobConfig>,

    /// Counting job.
    pub count: Option<CountJobConfig>,

    /// Pegasus worker package.
    pub worker: Option<WorkerConfig>,

    /// Planner invocation.
    pub planner: Option<PlannerConfig>,

    /// Extra Pegasus properties written verbatim to `pegasus.properties`.
    pub properties: BTreeMap<String, String>,
}

impl PlankifierConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced wholesale; properties are merged key by key.
    pub fn merge(&mut self, other: PlankifierConfig) {
        if other.workflow.is_some() {
            self.workflow = other.workflow;
        }
        if other.sites.is_some() {
            self.sites = other.sites;
        }
        if other.plankifier.is_some() {
            self.plankifier = other.plankifier;
        }
        if other.count.is_some() {
            self.count = other.count;
        }
        if other.worker.is_some() {
            self.worker = other.worker;
        }
        if other.planner.is_some() {
            self.planner = other.planner;
        }
        self.properties.extend(other.properties);
    }

    /// Workflow section with defaults.
    pub fn workflow(&self) -> WorkflowConfig {
        self.workflow.clone().unwrap_or_default()
    }

    /// Sites section with defaults.
    pub fn sites(&self) -> SitesConfig {
        self.sites.clone().unwrap_or_default()
    }

    /// Classification job section with defaults.
    pub fn plankifier(&self) -> PlankifierJobConfig {
        self.plankifier.clone().unwrap_or_default()
    }

    /// Counting job section with defaults.
    pub fn count(&self) -> CountJobConfig {
        self.count.clone().unwrap_or_default()
    }

    /// Worker package section with defaults.
    pub fn worker(&self) -> WorkerConfig {
        self.worker.clone().unwrap_or_default()
    }

    /// Planner section with defaults.
    pub fn planner(&self) -> PlannerConfig {
        self.planner.clone().unwrap_or_default()
    }

    /// Fill every missing section with its defaults.
    ///
    /// Used when printing the effective configuration.
    pub fn resolved(&self) -> Self {
        Self {
            workflow: Some(self.workflow()),
            sites: Some(self.sites()),
            plankifier: Some(self.plankifier()),
            count: Some(self.count()),
            worker: Some(self.worker()),
            planner: Some(self.planner()),
            properties: self.properties.clone(),
        }
    }

    /// Check values that would produce an unusable workflow.
    pub fn validate(&self) -> Result<()> {
        let workflow = self.workflow();
        require_non_empty("workflow.name", &workflow.name)?;
        require_non_empty("workflow.output", &workflow.output)?;

        let sites = self.sites();
        require_non_empty("sites.execution_site", &sites.execution_site)?;
        require_non_empty("sites.local_site", &sites.local_site)?;
        if sites.execution_site == sites.local_site {
            return Err(ConfigError::invalid(
                "sites.execution_site",
                format!("must differ from the local site '{}'", sites.local_site),
            ));
        }

        let job = self.plankifier();
        require_non_empty("plankifier.pfn", &job.pfn)?;
        require_non_empty("plankifier.ensemble_method", &job.ensemble_method)?;
        require_non_empty("plankifier.pred_name", &job.pred_name)?;
        if !(job.threshold > 0.0 && job.threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "plankifier.threshold",
                format!("{} is outside (0, 1]", job.threshold),
            ));
        }

        let count = self.count();
        require_non_empty("count.pfn", &count.pfn)?;
        require_non_empty("count.output", &count.output)?;

        let worker = self.worker();
        if worker.enabled {
            require_non_empty("worker.pfn", &worker.pfn)?;
            if let Some(ref site) = worker.site {
                require_non_empty("worker.site", site)?;
            }
        }

        let planner = self.planner();
        require_non_empty("planner.executable", &planner.executable)?;
        if planner.output_sites.is_empty() {
            return Err(ConfigError::invalid(
                "planner.output_sites",
                "at least one output site is required",
            ));
        }

        for (key, value) in &self.properties {
            if key.trim().is_empty() {
                return Err(ConfigError::invalid("properties", "empty property key"));
            }
            if value.contains(['\n', '\r']) {
                return Err(ConfigError::invalid(
                    &format!("properties.{key}"),
                    "value contains a line break",
                ));
            }
        }

        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Workflow-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Workflow name, as shown by Pegasus tooling.
    pub name: String,
    /// File name the workflow DAG is written to.
    pub output: String,
    /// Derive job edges from file producers and consumers.
    pub infer_dependencies: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            name: "plankifier-wf".to_string(),
            output: "workflow.yml".to_string(),
            infer_dependencies: true,
        }
    }
}

/// Site catalog layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitesConfig {
    /// HTCondor pool the jobs run on.
    pub execution_site: String,
    /// Submit-host site holding scratch and output storage.
    pub local_site: String,
    /// Shared scratch directory, relative to the work directory.
    pub scratch_dir: String,
    /// Local storage (stage-out target), relative to the work directory.
    pub storage_dir: String,
    /// Pegasus `style` profile for the execution site.
    pub style: String,
    /// HTCondor universe for the execution site.
    pub universe: String,
    /// Pegasus data configuration (`condorio`, `sharedfs`, `nonsharedfs`).
    pub data_configuration: String,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            execution_site: "condorpool".to_string(),
            local_site: "local".to_string(),
            scratch_dir: "scratch".to_string(),
            storage_dir: "output".to_string(),
            style: "condor".to_string(),
            universe: "vanilla".to_string(),
            data_configuration: "condorio".to_string(),
        }
    }
}

/// The classification step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlankifierJobConfig {
    /// Transformation name.
    pub transformation: String,
    /// Installed path of the prediction script on the execution site.
    pub pfn: String,
    /// Trained Keras model.
    pub model: String,
    /// Best weights for the model.
    pub weights: String,
    /// Directory of camera images to classify.
    pub test_dirs: String,
    /// Abstention threshold.
    pub threshold: f64,
    /// Ensemble method (e.g. `unanimity`, `leader`).
    pub ensemble_method: String,
    /// Prefix for prediction output files.
    pub pred_name: String,
    /// HTCondor `requirements` expression, empty for none.
    pub requirements: String,
}

impl Default for PlankifierJobConfig {
    fn default() -> Self {
        Self {
            transformation: "plankifier".to_string(),
            pfn: "/srv/plankifier/predict.py".to_string(),
            model: "/srv/plankifier/trained-models/conv2/keras_model.h5".to_string(),
            weights: "/srv/plankifier/trained-models/conv2/bestweights.hdf5".to_string(),
            test_dirs: "/srv/plankifier/camera-images".to_string(),
            threshold: 0.6,
            ensemble_method: "unanimity".to_string(),
            pred_name: "./predict".to_string(),
            requirements: r#"DC_ID == "dc-1" && TARGET.Arch == "AARCH64""#.to_string(),
        }
    }
}

/// The counting step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountJobConfig {
    /// Transformation name.
    pub transformation: String,
    /// Counting script; relative paths resolve against the work directory.
    pub pfn: String,
    /// File capturing the job's stdout.
    pub output: String,
}

impl Default for CountJobConfig {
    fn default() -> Self {
        Self {
            transformation: "count".to_string(),
            pfn: "bin/count.sh".to_string(),
            output: "count.txt".to_string(),
        }
    }
}

/// The Pegasus worker package staged to execution nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Register the worker package in the transformation catalog.
    pub enabled: bool,
    pub namespace: String,
    pub name: String,
    /// Site the package is registered for; the execution site when unset.
    pub site: Option<String>,
    /// Download URL of the worker tarball.
    pub pfn: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "pegasus".to_string(),
            name: "worker".to_string(),
            site: None,
            pfn: "https://download.pegasus.isi.edu/pegasus/5.1.1/pegasus-worker-5.1.1-x86_64_rhel_8.tar.gz"
                .to_string(),
        }
    }
}

/// Cleanup strategy passed to `pegasus-plan --cleanup`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    None,
    #[default]
    Inplace,
    Leaf,
    Constraint,
}

impl fmt::Display for CleanupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CleanupMode::None => "none",
            CleanupMode::Inplace => "inplace",
            CleanupMode::Leaf => "leaf",
            CleanupMode::Constraint => "constraint",
        };
        f.write_str(s)
    }
}

/// Planner invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Planner executable (looked up on `PATH` when not absolute).
    pub executable: String,
    /// Sites receiving staged-out outputs.
    pub output_sites: Vec<String>,
    pub cleanup: CleanupMode,
    /// Submit the planned workflow to HTCondor.
    pub submit: bool,
    /// Base directory for submit directories, relative to the work directory.
    pub submit_dir: Option<String>,
    /// Kill the planner after this many seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            executable: "pegasus-plan".to_string(),
            output_sites: vec!["local".to_string()],
            cleanup: CleanupMode::default(),
            submit: true,
            submit_dir: None,
            timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PlankifierConfig::from_toml("").unwrap();
        assert_eq!(config, PlankifierConfig::new());
        assert_eq!(config.workflow().name, "plankifier-wf");
        assert_eq!(config.sites().execution_site, "condorpool");
        assert_eq!(config.plankifier().threshold, 0.6);
        assert_eq!(config.count().pfn, "bin/count.sh");
        assert_eq!(config.planner().cleanup, CleanupMode::Inplace);
        assert!(config.planner().submit);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let config = PlankifierConfig::from_toml(
            r#"
[plankifier]
threshold = 0.8
ensemble_method = "leader"
"#,
        )
        .unwrap();
        let job = config.plankifier();
        assert_eq!(job.threshold, 0.8);
        assert_eq!(job.ensemble_method, "leader");
        assert_eq!(job.pfn, "/srv/plankifier/predict.py");
    }

    #[test]
    fn test_parse_planner_and_properties() {
        let config = PlankifierConfig::from_toml(
            r#"
[planner]
executable = "/opt/pegasus/bin/pegasus-plan"
cleanup = "leaf"
submit = false
timeout_secs = 120

[properties]
"pegasus.monitord.encoding" = "json"
"#,
        )
        .unwrap();
        let planner = config.planner();
        assert_eq!(planner.executable, "/opt/pegasus/bin/pegasus-plan");
        assert_eq!(planner.cleanup, CleanupMode::Leaf);
        assert!(!planner.submit);
        assert_eq!(planner.timeout_secs, Some(120));
        assert_eq!(planner.output_sites, vec!["local"]);
        assert_eq!(config.properties["pegasus.monitord.encoding"], "json");
    }

    #[test]
    fn test_unknown_cleanup_mode_rejected() {
        let err = PlankifierConfig::from_toml("[planner]\ncleanup = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_merge_replaces_sections_and_merges_properties() {
        let mut base = PlankifierConfig::from_toml(
            r#"
[sites]
execution_site = "pool-a"

[properties]
"a" = "1"
"b" = "2"
"#,
        )
        .unwrap();
        let overlay = PlankifierConfig::from_toml(
            r#"
[count]
output = "totals.txt"

[properties]
"b" = "3"
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.sites().execution_site, "pool-a");
        assert_eq!(base.count().output, "totals.txt");
        assert_eq!(base.properties["a"], "1");
        assert_eq!(base.properties["b"], "3");
    }

    #[test]
    fn test_validate_threshold_range() {
        let config = PlankifierConfig::from_toml("[plankifier]\nthreshold = 1.5\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("plankifier.threshold"));

        let config = PlankifierConfig::from_toml("[plankifier]\nthreshold = 0.0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_exec_site_differs_from_local() {
        let config = PlankifierConfig::from_toml("[sites]\nexecution_site = \"local\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_validate_empty_planner_outputs() {
        let config = PlankifierConfig::from_toml("[planner]\noutput_sites = []\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_worker_skips_worker_checks() {
        let config =
            PlankifierConfig::from_toml("[worker]\nenabled = false\npfn = \"\"\n").unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_worker_site_rejected() {
        let config = PlankifierConfig::from_toml("[worker]\nsite = \"\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker.site"));
    }

    #[test]
    fn test_property_value_line_break_rejected() {
        let config = PlankifierConfig::from_toml(
            "[properties]\n\"pegasus.mode\" = \"development\\npegasus.integrity.checking = none\"\n",
        )
        .unwrap();
        assert_eq!(
            config.properties["pegasus.mode"],
            "development\npegasus.integrity.checking = none"
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("properties.pegasus.mode"));
    }

    #[test]
    fn test_resolved_roundtrips_through_toml() {
        let resolved = PlankifierConfig::new().resolved();
        let text = resolved.to_toml().unwrap();
        assert!(text.contains("[plankifier]"));
        assert!(text.contains("condorpool"));
        let parsed = PlankifierConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, resolved);
    }
}
