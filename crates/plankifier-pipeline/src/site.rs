//! Site catalog (`sites.yml`).
//!
//! Describes where data lives and where jobs run:
//!
//! ```yaml
//! pegasus: 5.0.4
//! sites:
//! - name: local
//!   directories:
//!   - type: sharedScratch
//!     path: /work/scratch
//!     sharedFileSystem: false
//!     fileServers:
//!     - url: file:///work/scratch
//!       operation: all
//! - name: condorpool
//!   profiles:
//!     pegasus: { style: condor, data.configuration: condorio }
//!     condor: { universe: vanilla }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::profile::{Namespace, Profiles};
use crate::schema::{self, Metadata, PEGASUS_SCHEMA_VERSION};

/// Default site catalog file name.
pub const SITES_FILE: &str = "sites.yml";

/// Role of a directory on a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirectoryType {
    SharedScratch,
    SharedStorage,
    LocalScratch,
    LocalStorage,
}

/// Operations a file server supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    All,
    Get,
    Put,
}

/// Access point for a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileServer {
    pub url: String,
    pub operation: Operation,
}

impl FileServer {
    pub fn new(url: impl Into<String>, operation: Operation) -> Self {
        Self {
            url: url.into(),
            operation,
        }
    }
}

/// A directory on a site, reachable through one or more file servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    #[serde(rename = "type")]
    pub directory_type: DirectoryType,
    pub path: String,
    pub shared_file_system: bool,
    pub file_servers: Vec<FileServer>,
}

impl Directory {
    pub fn new(directory_type: DirectoryType, path: impl Into<String>) -> Self {
        Self {
            directory_type,
            path: path.into(),
            shared_file_system: false,
            file_servers: Vec::new(),
        }
    }

    pub fn add_file_server(mut self, server: FileServer) -> Self {
        self.file_servers.push(server);
        self
    }
}

/// A named site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<Directory>,
    #[serde(default, skip_serializing_if = "Profiles::is_empty")]
    pub profiles: Profiles,
}

impl Site {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directories: Vec::new(),
            profiles: Profiles::new(),
        }
    }

    pub fn add_directory(mut self, directory: Directory) -> Self {
        self.directories.push(directory);
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

    pub fn add_pegasus_profile(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_profile(Namespace::Pegasus, key, value)
    }

    pub fn add_condor_profile(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_profile(Namespace::Condor, key, value)
    }

    /// Check the site's name, directory paths, and file server URLs.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::InvalidSite("Site name cannot be empty".into()));
        }
        for dir in &self.directories {
            if !Path::new(&dir.path).is_absolute() {
                return Err(PipelineError::InvalidSite(format!(
                    "Site '{}' directory path '{}' must be absolute",
                    self.name, dir.path
                )));
            }
            for server in &dir.file_servers {
                if !schema::has_url_scheme(&server.url) {
                    return Err(PipelineError::InvalidSite(format!(
                        "Site '{}' file server '{}' is not a URL",
                        self.name, server.url
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The set of sites the planner may use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteCatalog {
    sites: Vec<Site>,
}

#[derive(Serialize)]
struct SiteCatalogDocument<'a> {
    #[serde(rename = "x-pegasus")]
    metadata: Metadata,
    pegasus: &'static str,
    sites: &'a [Site],
}

impl SiteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a site. Site names are unique.
    pub fn add_site(&mut self, site: Site) -> Result<()> {
        if self.site(&site.name).is_some() {
            return Err(PipelineError::DuplicateSite(site.name));
        }
        self.sites.push(site);
        Ok(())
    }

    pub fn site(&self, name: &str) -> Option<&Site> {
        self.sites.iter().find(|s| s.name == name)
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn validate(&self) -> Result<()> {
        self.sites.iter().try_for_each(Site::validate)
    }

    pub fn to_yaml(&self) -> Result<String> {
        schema::to_yaml(
            "site catalog",
            &SiteCatalogDocument {
                metadata: Metadata::now(),
                pegasus: PEGASUS_SCHEMA_VERSION,
                sites: &self.sites,
            },
        )
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        schema::write_file(path, &self.to_yaml()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_site() -> Site {
        Site::new("local").add_directory(
            Directory::new(DirectoryType::SharedScratch, "/work/scratch")
                .add_file_server(FileServer::new("file:///work/scratch", Operation::All)),
        )
    }

    #[test]
    fn test_duplicate_site_rejected() {
        let mut catalog = SiteCatalog::new();
        catalog.add_site(local_site()).unwrap();
        let err = catalog.add_site(Site::new("local")).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateSite(ref name) if name == "local"));
        assert_eq!(catalog.sites().len(), 1);
    }

    #[test]
    fn test_validate_relative_directory() {
        let site = Site::new("local")
            .add_directory(Directory::new(DirectoryType::LocalStorage, "output"));
        let err = site.validate().unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }

    #[test]
    fn test_validate_file_server_url() {
        let site = Site::new("local").add_directory(
            Directory::new(DirectoryType::LocalStorage, "/work/output")
                .add_file_server(FileServer::new("/work/output", Operation::All)),
        );
        let err = site.validate().unwrap_err();
        assert!(err.to_string().contains("is not a URL"));
    }

    #[test]
    fn test_validate_empty_name() {
        assert!(Site::new(" ").validate().is_err());
    }

    #[test]
    fn test_yaml_layout() {
        let mut catalog = SiteCatalog::new();
        catalog.add_site(local_site()).unwrap();
        catalog
            .add_site(
                Site::new("condorpool")
                    .add_pegasus_profile("style", "condor")
                    .add_condor_profile("universe", "vanilla"),
            )
            .unwrap();
        catalog.validate().unwrap();

        let yaml = catalog.to_yaml().unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(doc["pegasus"], PEGASUS_SCHEMA_VERSION);
        assert_eq!(doc["x-pegasus"]["apiLang"], "rust");

        let local = &doc["sites"][0];
        assert_eq!(local["name"], "local");
        let dir = &local["directories"][0];
        assert_eq!(dir["type"], "sharedScratch");
        assert_eq!(dir["path"], "/work/scratch");
        assert_eq!(dir["sharedFileSystem"], false);
        assert_eq!(dir["fileServers"][0]["url"], "file:///work/scratch");
        assert_eq!(dir["fileServers"][0]["operation"], "all");
        assert!(local.get("profiles").is_none());

        let pool = &doc["sites"][1];
        assert_eq!(pool["profiles"]["pegasus"]["style"], "condor");
        assert_eq!(pool["profiles"]["condor"]["universe"], "vanilla");
        assert!(pool.get("directories").is_none());
    }
}
