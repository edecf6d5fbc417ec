//! Shared envelope for the YAML documents the planner reads.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Pegasus YAML schema version written into every document.
pub const PEGASUS_SCHEMA_VERSION: &str = "5.0.4";

/// The `x-pegasus` block recording who generated a document and when.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub api_lang: String,
    pub created_by: String,
    pub created_on: String,
}

impl Metadata {
    /// Stamp with the current user and UTC time.
    pub fn now() -> Self {
        let created_by = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            api_lang: "rust".to_string(),
            created_by,
            created_on: chrono::Utc::now().format("%m-%d-%yT%H:%M:%SZ").to_string(),
        }
    }
}

pub(crate) fn to_yaml<T: Serialize>(what: &'static str, value: &T) -> Result<String> {
    serde_yaml::to_string(value).map_err(|source| PipelineError::Serialize { what, source })
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| PipelineError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote document");
    Ok(())
}

/// True when `s` looks like `scheme://rest` with an alphabetic scheme.
pub(crate) fn has_url_scheme(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        }
        None => false,
    }
}
