//! The plankton classification pipeline.
//!
//! Two jobs on an HTCondor pool:
//!
//! ```text
//! plankifier ──predict_<method>abs<threshold>.txt──▶ count ──stdout──▶ count.txt
//! ```
//!
//! `plankifier` runs the pre-installed ensemble classifier over the camera
//! images; `count` tallies its predictions. Both outputs are staged back to
//! the `local` site's storage directory.

use std::path::{Path, PathBuf};

use plankifier_config::PlankifierConfig;
use tracing::debug;

use crate::catalog::{CatalogSet, WrittenFiles};
use crate::error::{PipelineError, Result};
use crate::planner::{PlanOutcome, Planner};
use crate::properties::Properties;
use crate::site::{Directory, DirectoryType, FileServer, Operation, Site, SiteCatalog};
use crate::transformation::{Transformation, TransformationCatalog};
use crate::workflow::{File, Job, Workflow};

/// Builds the catalogs and DAG for one run of the pipeline.
///
/// Each `create_*` step is independent; [`write`](Self::write) requires the
/// properties, transformation catalog, and workflow to exist, and writes the
/// site catalog only if it was created.
#[derive(Debug, Clone)]
pub struct PlankifierWorkflow {
    config: PlankifierConfig,
    work_dir: PathBuf,
    workflow_file: String,
    properties: Option<Properties>,
    sites: Option<SiteCatalog>,
    transformations: Option<TransformationCatalog>,
    workflow: Option<Workflow>,
}

impl PlankifierWorkflow {
    /// `work_dir` must be absolute; scratch and output directories live
    /// beneath it and relative executable paths resolve against it.
    pub fn new(
        config: PlankifierConfig,
        work_dir: impl Into<PathBuf>,
        workflow_file: impl Into<String>,
    ) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
            workflow_file: workflow_file.into(),
            properties: None,
            sites: None,
            transformations: None,
            workflow: None,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn workflow_file(&self) -> &str {
        &self.workflow_file
    }

    pub fn name(&self) -> String {
        self.config.workflow().name
    }

    /// Pegasus properties: none by default, plus the `[properties]` table.
    pub fn create_pegasus_properties(&mut self) -> Result<&Properties> {
        let mut props = Properties::new();
        for (key, value) in &self.config.properties {
            props.set(key.clone(), value.clone())?;
        }
        debug!(count = props.len(), "created properties");
        Ok(self.properties.insert(props))
    }

    /// `local` (scratch + output storage) and the HTCondor execution site.
    pub fn create_sites_catalog(&mut self, exec_site_name: &str) -> Result<&SiteCatalog> {
        let sites_cfg = self.config.sites();
        let scratch = path_string(&self.work_dir.join(&sites_cfg.scratch_dir));
        let storage = path_string(&self.work_dir.join(&sites_cfg.storage_dir));

        let local = Site::new(&sites_cfg.local_site)
            .add_directory(
                Directory::new(DirectoryType::SharedScratch, &scratch).add_file_server(
                    FileServer::new(format!("file://{scratch}"), Operation::All),
                ),
            )
            .add_directory(
                Directory::new(DirectoryType::LocalStorage, &storage).add_file_server(
                    FileServer::new(format!("file://{storage}"), Operation::All),
                ),
            );

        let exec_site = Site::new(exec_site_name)
            .add_pegasus_profile("style", &sites_cfg.style)
            .add_condor_profile("universe", &sites_cfg.universe)
            .add_pegasus_profile("data.configuration", &sites_cfg.data_configuration);

        let mut catalog = SiteCatalog::new();
        catalog.add_site(local)?;
        catalog.add_site(exec_site)?;
        debug!(exec_site = exec_site_name, scratch = %scratch, storage = %storage, "created site catalog");
        Ok(self.sites.insert(catalog))
    }

    /// The worker package, the classifier, and the counting script.
    pub fn create_transformation_catalog(
        &mut self,
        exec_site_name: &str,
    ) -> Result<&TransformationCatalog> {
        let job_cfg = self.config.plankifier();
        let count_cfg = self.config.count();
        let worker_cfg = self.config.worker();

        let plankifier = Transformation::new(
            &job_cfg.transformation,
            exec_site_name,
            &job_cfg.pfn,
            false,
        );
        let count_pfn = path_string(&resolve_path(&self.work_dir, &count_cfg.pfn)?);
        let count = Transformation::new(&count_cfg.transformation, exec_site_name, count_pfn, true);

        let mut catalog = TransformationCatalog::new();
        catalog.add_transformation(plankifier)?;
        catalog.add_transformation(count)?;
        if worker_cfg.enabled {
            let worker_site = worker_cfg.site.as_deref().unwrap_or(exec_site_name);
            let worker = Transformation::new(&worker_cfg.name, worker_site, &worker_cfg.pfn, true)
                .with_namespace(&worker_cfg.namespace);
            catalog.add_transformation(worker)?;
        }
        debug!(count = catalog.transformations().len(), "created transformation catalog");
        Ok(self.transformations.insert(catalog))
    }

    /// The two-job DAG; the edge is inferred from the predictions file.
    pub fn create_workflow(&mut self) -> Result<&Workflow> {
        let wf_cfg = self.config.workflow();
        let job_cfg = self.config.plankifier();
        let count_cfg = self.config.count();

        let mut wf = Workflow::new(&wf_cfg.name, wf_cfg.infer_dependencies);

        let matches = File::new(prediction_file_name(
            &job_cfg.pred_name,
            &job_cfg.ensemble_method,
            job_cfg.threshold,
        ));
        let mut plankifier_job = Job::new(&job_cfg.transformation)
            .add_args(["-modelfullnames", job_cfg.model.as_str()])
            .add_args(["-weightnames", job_cfg.weights.as_str()])
            .add_args(["-testdirs", job_cfg.test_dirs.as_str()])
            .add_args(["-thresholds".to_string(), format_threshold(job_cfg.threshold)])
            .add_args(["-ensMethods", job_cfg.ensemble_method.as_str()])
            .add_args(["-predname", job_cfg.pred_name.as_str()])
            .add_outputs([&matches], true, true);
        if !job_cfg.requirements.trim().is_empty() {
            plankifier_job = plankifier_job.add_condor_profile("requirements", &job_cfg.requirements);
        }

        let count = File::new(&count_cfg.output);
        let count_job = Job::new(&count_cfg.transformation)
            .add_args([&matches, &count])
            .add_inputs([&matches])
            .set_stdout(&count, true, true);

        let parent = wf.add_job(plankifier_job)?;
        let child = wf.add_job(count_job)?;
        if !wf.infers_dependencies() {
            wf.add_dependency(parent, child);
        }
        debug!(name = %wf.name(), jobs = wf.jobs().len(), "created workflow");
        Ok(self.workflow.insert(wf))
    }

    /// Assemble the created artifacts.
    pub fn catalog_set(&self) -> Result<CatalogSet> {
        Ok(CatalogSet {
            properties: self
                .properties
                .clone()
                .ok_or(PipelineError::NotCreated("Properties"))?,
            sites: self.sites.clone(),
            transformations: self
                .transformations
                .clone()
                .ok_or(PipelineError::NotCreated("Transformation catalog"))?,
            workflow: self
                .workflow
                .clone()
                .ok_or(PipelineError::NotCreated("Workflow"))?,
        })
    }

    /// Write every created artifact into the work directory.
    pub fn write(&self) -> Result<WrittenFiles> {
        self.catalog_set()?
            .write_to(&self.work_dir, &self.workflow_file)
    }

    /// Hand the written workflow to the planner.
    pub async fn plan(&self, planner: &Planner) -> Result<PlanOutcome> {
        planner
            .plan(Path::new(&self.workflow_file), &self.work_dir)
            .await
    }
}

/// Name of the classifier's prediction file.
///
/// The classifier writes `<predname>_<method>abs<threshold>.txt` next to
/// the prefix; only the file name is kept as the LFN.
pub fn prediction_file_name(pred_name: &str, ensemble_method: &str, threshold: f64) -> String {
    let prefix = Path::new(pred_name)
        .file_name()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| pred_name.to_string());
    format!(
        "{}_{}abs{}.txt",
        prefix,
        ensemble_method,
        format_threshold(threshold)
    )
}

/// Threshold as the classifier prints it.
///
/// Whole numbers keep a `.0`, and values below `1e-4` switch to exponent
/// form with at least two exponent digits (`1e-05`, `2.5e-07`).
pub fn format_threshold(threshold: f64) -> String {
    if threshold != 0.0 && threshold.abs() < 1e-4 {
        let sci = format!("{threshold:e}");
        if let Some((mantissa, exponent)) = sci.split_once('e')
            && let Ok(exponent) = exponent.parse::<i32>()
        {
            let sign = if exponent < 0 { '-' } else { '+' };
            return format!("{mantissa}e{sign}{:02}", exponent.abs());
        }
        return sci;
    }
    if threshold.fract() == 0.0 {
        format!("{threshold:.1}")
    } else {
        threshold.to_string()
    }
}

fn resolve_path(base: &Path, path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::path::absolute(base.join(path))?)
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Namespace;
    use crate::transformation::TransformationType;

    fn built(dir: &Path) -> PlankifierWorkflow {
        let mut wf = PlankifierWorkflow::new(PlankifierConfig::new(), dir, "workflow.yml");
        wf.create_sites_catalog("condorpool").unwrap();
        wf.create_pegasus_properties().unwrap();
        wf.create_transformation_catalog("condorpool").unwrap();
        wf.create_workflow().unwrap();
        wf
    }

    #[test]
    fn test_prediction_file_name() {
        assert_eq!(
            prediction_file_name("./predict", "unanimity", 0.6),
            "predict_unanimityabs0.6.txt"
        );
        assert_eq!(
            prediction_file_name("out/run", "leader", 1.0),
            "run_leaderabs1.0.txt"
        );
    }

    #[test]
    fn test_format_threshold() {
        assert_eq!(format_threshold(0.6), "0.6");
        assert_eq!(format_threshold(0.75), "0.75");
        assert_eq!(format_threshold(1.0), "1.0");
        assert_eq!(format_threshold(0.0001), "0.0001");
        assert_eq!(format_threshold(0.00001), "1e-05");
        assert_eq!(format_threshold(0.000025), "2.5e-05");
        assert_eq!(
            prediction_file_name("./predict", "leader", 0.00001),
            "predict_leaderabs1e-05.txt"
        );
    }

    #[test]
    fn test_sites_catalog() {
        let set = built(Path::new("/work")).catalog_set().unwrap();
        let sites = set.sites.unwrap();

        let local = sites.site("local").unwrap();
        assert_eq!(local.directories.len(), 2);
        assert_eq!(local.directories[0].directory_type, DirectoryType::SharedScratch);
        assert_eq!(local.directories[0].path, "/work/scratch");
        assert_eq!(local.directories[0].file_servers[0].url, "file:///work/scratch");
        assert_eq!(local.directories[1].directory_type, DirectoryType::LocalStorage);
        assert_eq!(local.directories[1].file_servers[0].url, "file:///work/output");

        let pool = sites.site("condorpool").unwrap();
        assert_eq!(pool.profiles.get(Namespace::Pegasus, "style"), Some("condor"));
        assert_eq!(pool.profiles.get(Namespace::Condor, "universe"), Some("vanilla"));
        assert_eq!(
            pool.profiles.get(Namespace::Pegasus, "data.configuration"),
            Some("condorio")
        );
    }

    #[test]
    fn test_transformation_catalog() {
        let set = built(Path::new("/work")).catalog_set().unwrap();
        let tc = set.transformations;

        let plankifier = tc.lookup(None, "plankifier", None).unwrap();
        assert_eq!(plankifier.sites[0].pfn, "/srv/plankifier/predict.py");
        assert_eq!(plankifier.sites[0].transformation_type, TransformationType::Installed);

        let count = tc.lookup(None, "count", None).unwrap();
        assert_eq!(count.sites[0].pfn, "/work/bin/count.sh");
        assert_eq!(count.sites[0].transformation_type, TransformationType::Stageable);

        let worker = tc.lookup(Some("pegasus"), "worker", None).unwrap();
        assert_eq!(worker.sites[0].name, "condorpool");
        assert!(worker.sites[0].pfn.ends_with("pegasus-worker-5.1.1-x86_64_rhel_8.tar.gz"));
    }

    #[test]
    fn test_worker_follows_exec_site() {
        let mut wf = PlankifierWorkflow::new(PlankifierConfig::new(), "/work", "workflow.yml");
        wf.create_sites_catalog("gpu-pool").unwrap();
        wf.create_pegasus_properties().unwrap();
        let tc = wf.create_transformation_catalog("gpu-pool").unwrap();
        assert_eq!(tc.lookup(None, "plankifier", None).unwrap().sites[0].name, "gpu-pool");
        assert_eq!(tc.lookup(None, "worker", None).unwrap().sites[0].name, "gpu-pool");
        wf.create_workflow().unwrap();
        wf.catalog_set().unwrap().validate().unwrap();
    }

    #[test]
    fn test_worker_site_override_and_disable() {
        let config = PlankifierConfig::from_toml("[worker]\nsite = \"condorpool\"\n").unwrap();
        let mut wf = PlankifierWorkflow::new(config, "/work", "workflow.yml");
        let tc = wf.create_transformation_catalog("gpu-pool").unwrap();
        assert_eq!(tc.lookup(None, "worker", None).unwrap().sites[0].name, "condorpool");

        let config = PlankifierConfig::from_toml("[worker]\nenabled = false\n").unwrap();
        let mut wf = PlankifierWorkflow::new(config, "/work", "workflow.yml");
        let tc = wf.create_transformation_catalog("condorpool").unwrap();
        assert!(tc.lookup(None, "worker", None).is_none());
        assert_eq!(tc.transformations().len(), 2);
    }

    #[test]
    fn test_workflow_dag() {
        let set = built(Path::new("/work")).catalog_set().unwrap();
        let wf = &set.workflow;
        assert_eq!(wf.name(), "plankifier-wf");
        assert_eq!(wf.jobs().len(), 2);

        let classify = &wf.jobs()[0];
        assert_eq!(classify.name, "plankifier");
        assert_eq!(
            classify.command_line(),
            "-modelfullnames /srv/plankifier/trained-models/conv2/keras_model.h5 \
             -weightnames /srv/plankifier/trained-models/conv2/bestweights.hdf5 \
             -testdirs /srv/plankifier/camera-images -thresholds 0.6 \
             -ensMethods unanimity -predname ./predict"
        );
        assert_eq!(
            classify.outputs().collect::<Vec<_>>(),
            vec!["predict_unanimityabs0.6.txt"]
        );
        assert_eq!(
            classify.profiles.get(Namespace::Condor, "requirements"),
            Some(r#"DC_ID == "dc-1" && TARGET.Arch == "AARCH64""#)
        );

        let count = &wf.jobs()[1];
        assert_eq!(count.command_line(), "predict_unanimityabs0.6.txt count.txt");
        assert_eq!(count.stdout.as_deref(), Some("count.txt"));

        let deps = wf.dependency_list();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].id, classify.id);
        assert_eq!(deps[0].children, vec![count.id.clone()]);
        set.validate().unwrap();
    }

    #[test]
    fn test_explicit_edge_without_inference() {
        let config = PlankifierConfig::from_toml("[workflow]\ninfer_dependencies = false\n").unwrap();
        let mut wf = PlankifierWorkflow::new(config, "/work", "workflow.yml");
        let dag = wf.create_workflow().unwrap();
        assert!(!dag.infers_dependencies());
        assert_eq!(dag.dependency_list().len(), 1);
    }

    #[test]
    fn test_empty_requirements_omits_profile() {
        let config = PlankifierConfig::from_toml("[plankifier]\nrequirements = \"\"\n").unwrap();
        let mut wf = PlankifierWorkflow::new(config, "/work", "workflow.yml");
        let dag = wf.create_workflow().unwrap();
        assert!(dag.jobs()[0].profiles.is_empty());
    }

    #[test]
    fn test_write_requires_created_artifacts() {
        let wf = PlankifierWorkflow::new(PlankifierConfig::new(), "/work", "workflow.yml");
        let err = wf.write().unwrap_err();
        assert!(matches!(err, PipelineError::NotCreated("Properties")));
    }

    #[test]
    fn test_properties_from_config() {
        let config = PlankifierConfig::from_toml(
            "[properties]\n\"pegasus.monitord.encoding\" = \"json\"\n",
        )
        .unwrap();
        let mut wf = PlankifierWorkflow::new(config, "/work", "workflow.yml");
        let props = wf.create_pegasus_properties().unwrap();
        assert_eq!(props.get("pegasus.monitord.encoding"), Some("json"));
    }
}
