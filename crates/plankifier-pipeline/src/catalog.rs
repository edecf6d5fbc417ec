//! The bundle of artifacts handed to the planner.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::properties::{PROPERTIES_FILE, Properties};
use crate::site::{SITES_FILE, SiteCatalog};
use crate::transformation::{TRANSFORMATIONS_FILE, TransformationCatalog};
use crate::workflow::Workflow;

/// Properties, site catalog, transformation catalog, and workflow.
///
/// The site catalog is optional: when absent, the planner falls back to
/// whatever `sites.yml` already exists in the work directory.
#[derive(Debug, Clone)]
pub struct CatalogSet {
    pub properties: Properties,
    pub sites: Option<SiteCatalog>,
    pub transformations: TransformationCatalog,
    pub workflow: Workflow,
}

/// Paths written by [`CatalogSet::write_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub sites: Option<PathBuf>,
    pub properties: PathBuf,
    pub transformations: PathBuf,
    pub workflow: PathBuf,
}

impl WrittenFiles {
    /// All written paths, in write order.
    pub fn paths(&self) -> Vec<&Path> {
        self.sites
            .iter()
            .map(PathBuf::as_path)
            .chain([
                self.properties.as_path(),
                self.transformations.as_path(),
                self.workflow.as_path(),
            ])
            .collect()
    }
}

impl CatalogSet {
    /// Validate every artifact and the references between them.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref sites) = self.sites {
            sites.validate()?;
        }
        self.transformations.validate()?;
        self.workflow.validate()?;

        for job in self.workflow.jobs() {
            if self
                .transformations
                .lookup(job.namespace.as_deref(), &job.name, job.version.as_deref())
                .is_none()
            {
                return Err(PipelineError::UnknownTransformation {
                    job: job.id.clone(),
                    transformation: job.name.clone(),
                });
            }
        }

        if let Some(ref sites) = self.sites {
            for transformation in self.transformations.transformations() {
                for site in &transformation.sites {
                    if sites.site(&site.name).is_none() {
                        return Err(PipelineError::UnknownSite {
                            transformation: transformation.qualified_name(),
                            site: site.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Validate, then write all artifacts into `dir`.
    ///
    /// Files are written in the order site catalog, properties,
    /// transformation catalog, workflow (named `workflow_file`).
    pub fn write_to(&self, dir: &Path, workflow_file: &str) -> Result<WrittenFiles> {
        self.validate()?;
        let workflow = dir.join(workflow_file);
        let workflow_dir = workflow.parent().unwrap_or(dir);
        std::fs::create_dir_all(workflow_dir).map_err(|e| PipelineError::Write {
            path: workflow_dir.to_path_buf(),
            source: e,
        })?;
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::Write {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let sites = match self.sites {
            Some(ref catalog) => {
                let path = dir.join(SITES_FILE);
                catalog.write_to(&path)?;
                Some(path)
            }
            None => None,
        };

        let properties = dir.join(PROPERTIES_FILE);
        self.properties.write_to(&properties)?;

        let transformations = dir.join(TRANSFORMATIONS_FILE);
        self.transformations.write_to(&transformations)?;

        self.workflow.write_to(&workflow)?;

        let written = WrittenFiles {
            sites,
            properties,
            transformations,
            workflow,
        };
        info!(
            dir = %dir.display(),
            files = written.paths().len(),
            workflow = %self.workflow.name(),
            "wrote catalogs"
        );
        Ok(written)
    }
}
