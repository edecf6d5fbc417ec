//! Pegasus catalog model and planner wiring for the plankifier workflow.
//!
//! This crate describes the plankton classification pipeline to Pegasus WMS.
//! It builds the four artifacts the planner consumes and hands them over;
//! scheduling, staging, retries, and monitoring stay with Pegasus and HTCondor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  PlankifierWorkflow                                     │
//! │  - Properties          → pegasus.properties             │
//! │  - SiteCatalog         → sites.yml                      │
//! │  - TransformationCatalog → transformations.yml          │
//! │  - Workflow (DAG)      → workflow.yml                   │
//! └──────────────────────────┬──────────────────────────────┘
//!                            │ CatalogSet::write_to
//!                            ▼
//!                 Planner → pegasus-plan --submit
//! ```

pub mod catalog;
pub mod error;
pub mod planner;
pub mod plankifier;
pub mod profile;
pub mod properties;
pub mod schema;
pub mod site;
pub mod transformation;
pub mod workflow;

pub use catalog::{CatalogSet, WrittenFiles};
pub use error::{PipelineError, Result};
pub use planner::{PlanOutcome, Planner, PlannerOptions, parse_submit_dir};
pub use plankifier::{PlankifierWorkflow, format_threshold, prediction_file_name};
pub use profile::{Namespace, Profiles};
pub use properties::{PROPERTIES_FILE, Properties};
pub use schema::PEGASUS_SCHEMA_VERSION;
pub use site::{
    Directory, DirectoryType, FileServer, Operation, SITES_FILE, Site, SiteCatalog,
};
pub use transformation::{
    TRANSFORMATIONS_FILE, Transformation, TransformationCatalog, TransformationSite,
    TransformationType,
};
pub use workflow::{Arg, Dependency, File, Job, LinkType, Use, Workflow};
