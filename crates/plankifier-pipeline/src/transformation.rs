//! Transformation catalog (`transformations.yml`).
//!
//! Maps the logical executables jobs name to physical files (PFNs) per site.
//! An `installed` PFN already exists on the site; a `stageable` one is
//! shipped there by the planner before the job runs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::profile::{Namespace, Profiles};
use crate::schema::{self, Metadata, PEGASUS_SCHEMA_VERSION};

/// Default transformation catalog file name.
pub const TRANSFORMATIONS_FILE: &str = "transformations.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationType {
    Installed,
    Stageable,
}

/// Where a transformation lives on one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationSite {
    pub name: String,
    pub pfn: String,
    #[serde(rename = "type")]
    pub transformation_type: TransformationType,
}

impl TransformationSite {
    pub fn new(name: impl Into<String>, pfn: impl Into<String>, is_stageable: bool) -> Self {
        Self {
            name: name.into(),
            pfn: pfn.into(),
            transformation_type: if is_stageable {
                TransformationType::Stageable
            } else {
                TransformationType::Installed
            },
        }
    }
}

/// A logical executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub sites: Vec<TransformationSite>,
    #[serde(default, skip_serializing_if = "Profiles::is_empty")]
    pub profiles: Profiles,
}

impl Transformation {
    /// Create a transformation available on a single site.
    pub fn new(
        name: impl Into<String>,
        site: impl Into<String>,
        pfn: impl Into<String>,
        is_stageable: bool,
    ) -> Self {
        Self {
            namespace: None,
            name: name.into(),
            version: None,
            sites: vec![TransformationSite::new(site, pfn, is_stageable)],
            profiles: Profiles::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn add_site(mut self, site: TransformationSite) -> Self {
        self.sites.push(site);
        self
    }

    pub fn add_profile(
        mut self,
        namespace: Namespace,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.profiles.add(namespace, key, value);
        self
    }

    /// `namespace::name:version`, with absent parts omitted.
    pub fn qualified_name(&self) -> String {
        let mut out = String::new();
        if let Some(ref ns) = self.namespace {
            out.push_str(ns);
            out.push_str("::");
        }
        out.push_str(&self.name);
        if let Some(ref version) = self.version {
            out.push(':');
            out.push_str(version);
        }
        out
    }

    fn key(&self) -> (Option<&str>, &str, Option<&str>) {
        (
            self.namespace.as_deref(),
            self.name.as_str(),
            self.version.as_deref(),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::InvalidTransformation(
                "Transformation name cannot be empty".into(),
            ));
        }
        if self.sites.is_empty() {
            return Err(PipelineError::InvalidTransformation(format!(
                "'{}' is not available on any site",
                self.qualified_name()
            )));
        }
        for site in &self.sites {
            validate_pfn(&self.qualified_name(), site)?;
        }
        Ok(())
    }
}

fn validate_pfn(name: &str, site: &TransformationSite) -> Result<()> {
    let is_url = schema::has_url_scheme(&site.pfn);
    if !is_url && !Path::new(&site.pfn).is_absolute() {
        return Err(PipelineError::InvalidTransformation(format!(
            "'{}' on site '{}': PFN '{}' must be a URL or an absolute path",
            name, site.name, site.pfn
        )));
    }
    if is_url
        && site.transformation_type == TransformationType::Installed
        && !site.pfn.starts_with("file://")
    {
        return Err(PipelineError::InvalidTransformation(format!(
            "'{}' on site '{}': installed PFN '{}' must be a local path",
            name, site.name, site.pfn
        )));
    }
    Ok(())
}

/// The set of transformations jobs may run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformationCatalog {
    transformations: Vec<Transformation>,
}

#[derive(Serialize)]
struct TransformationCatalogDocument<'a> {
    #[serde(rename = "x-pegasus")]
    metadata: Metadata,
    pegasus: &'static str,
    transformations: &'a [Transformation],
}

impl TransformationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transformation. `(namespace, name, version)` is unique.
    pub fn add_transformation(&mut self, transformation: Transformation) -> Result<()> {
        if self
            .transformations
            .iter()
            .any(|t| t.key() == transformation.key())
        {
            return Err(PipelineError::DuplicateTransformation(
                transformation.qualified_name(),
            ));
        }
        self.transformations.push(transformation);
        Ok(())
    }

    /// Find a transformation by job reference.
    ///
    /// A `None` namespace or version in the reference matches any value.
    pub fn lookup(
        &self,
        namespace: Option<&str>,
        name: &str,
        version: Option<&str>,
    ) -> Option<&Transformation> {
        self.transformations.iter().find(|t| {
            t.name == name
                && namespace.is_none_or(|ns| t.namespace.as_deref() == Some(ns))
                && version.is_none_or(|v| t.version.as_deref() == Some(v))
        })
    }

    pub fn transformations(&self) -> &[Transformation] {
        &self.transformations
    }

    pub fn validate(&self) -> Result<()> {
        self.transformations
            .iter()
            .try_for_each(Transformation::validate)
    }

    pub fn to_yaml(&self) -> Result<String> {
        schema::to_yaml(
            "transformation catalog",
            &TransformationCatalogDocument {
                metadata: Metadata::now(),
                pegasus: PEGASUS_SCHEMA_VERSION,
                transformations: &self.transformations,
            },
        )
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        schema::write_file(path, &self.to_yaml()?)
    }
}
