//! Error types for catalog construction and planning.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building, writing, or planning a workflow.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid workflow definition.
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// Invalid site catalog entry.
    #[error("Invalid site: {0}")]
    InvalidSite(String),

    /// Invalid transformation catalog entry.
    #[error("Invalid transformation: {0}")]
    InvalidTransformation(String),

    /// Invalid Pegasus property.
    #[error("Invalid property '{key}': {reason}")]
    InvalidProperty { key: String, reason: String },

    /// Site declared twice in the site catalog.
    #[error("Duplicate site: {0}")]
    DuplicateSite(String),

    /// Transformation declared twice in the transformation catalog.
    #[error("Duplicate transformation: {0}")]
    DuplicateTransformation(String),

    /// Job id used twice in the workflow.
    #[error("Duplicate job ID: {0}")]
    DuplicateJob(String),

    /// A job runs a transformation the catalog does not know.
    #[error("Job '{job}' uses unknown transformation '{transformation}'")]
    UnknownTransformation { job: String, transformation: String },

    /// A transformation is registered for a site the site catalog does not declare.
    #[error("Transformation '{transformation}' references unknown site '{site}'")]
    UnknownSite {
        transformation: String,
        site: String,
    },

    /// Catalogs were written or planned before being created.
    #[error("{0} has not been created")]
    NotCreated(&'static str),

    /// Failed to serialize a catalog.
    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        source: serde_yaml::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Could not start the planner.
    #[error("Failed to spawn planner '{executable}': {source}")]
    PlannerSpawn {
        executable: String,
        source: std::io::Error,
    },

    /// Planner ran longer than allowed.
    #[error("Planner timed out after {0:?}")]
    PlannerTimeout(Duration),

    /// Planner exited unsuccessfully.
    #[error("Planner exited with code {code}: {stderr}")]
    PlannerFailed { code: i32, stderr: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
