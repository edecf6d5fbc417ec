//! Abstract workflow: jobs, the files they exchange, and the DAG between them.
//!
//! Jobs reference transformations by name and declare the logical files
//! (LFNs) they read and write. With dependency inference enabled, an edge
//! `producer -> consumer` is added for every file one job writes and another
//! reads, on top of any explicit edges.
//!
//! # Example YAML
//!
//! ```yaml
//! pegasus: 5.0.4
//! name: plankifier-wf
//! jobs:
//! - type: job
//!   name: count
//!   id: ID0000002
//!   arguments: [predict_unanimityabs0.6.txt, count.txt]
//!   uses:
//!   - lfn: predict_unanimityabs0.6.txt
//!     type: input
//! jobDependencies:
//! - id: ID0000001
//!   children: [ID0000002]
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::profile::{Namespace, Profiles};
use crate::schema::{self, Metadata, PEGASUS_SCHEMA_VERSION};

/// A logical file, identified by its LFN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct File {
    lfn: String,
}

impl File {
    pub fn new(lfn: impl Into<String>) -> Self {
        Self { lfn: lfn.into() }
    }

    pub fn lfn(&self) -> &str {
        &self.lfn
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lfn)
    }
}

/// How a job uses a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Input,
    Output,
    Inout,
}

impl LinkType {
    fn reads(self) -> bool {
        matches!(self, LinkType::Input | LinkType::Inout)
    }

    fn writes(self) -> bool {
        matches!(self, LinkType::Output | LinkType::Inout)
    }
}

/// A file use declared by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Use {
    pub lfn: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_replica: Option<bool>,
}

impl Use {
    fn input(file: &File) -> Self {
        Self {
            lfn: file.lfn.clone(),
            link_type: LinkType::Input,
            stage_out: None,
            register_replica: None,
        }
    }

    fn output(file: &File, stage_out: bool, register_replica: bool) -> Self {
        Self {
            lfn: file.lfn.clone(),
            link_type: LinkType::Output,
            stage_out: Some(stage_out),
            register_replica: Some(register_replica),
        }
    }

    fn inout(file: &File, stage_out: bool, register_replica: bool) -> Self {
        Self {
            link_type: LinkType::Inout,
            ..Self::output(file, stage_out, register_replica)
        }
    }
}

/// A command-line argument: literal text or a file reference.
///
/// Both render as plain strings; file references render as their LFN, which
/// the planner rewrites to the staged path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Text(String),
    File(File),
}

impl Arg {
    pub fn as_str(&self) -> &str {
        match self {
            Arg::Text(s) => s,
            Arg::File(f) => f.lfn(),
        }
    }
}

impl Serialize for Arg {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<&File> for Arg {
    fn from(f: &File) -> Self {
        Arg::File(f.clone())
    }
}

impl From<File> for Arg {
    fn from(f: File) -> Self {
        Arg::File(f)
    }
}

/// An invocation of a transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Transformation name.
    pub name: String,
    /// Unique id within the workflow; assigned on insertion when empty.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    pub arguments: Vec<Arg>,
    pub uses: Vec<Use>,
    #[serde(skip_serializing_if = "Profiles::is_empty")]
    pub profiles: Profiles,
}

impl Job {
    /// Create a job running the named transformation.
    pub fn new(transformation: impl Into<String>) -> Self {
        Self {
            name: transformation.into(),
            id: String::new(),
            namespace: None,
            version: None,
            stdin: None,
            stdout: None,
            stderr: None,
            arguments: Vec::new(),
            uses: Vec::new(),
            profiles: Profiles::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Append arguments.
    pub fn add_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn add_inputs<'a>(mut self, files: impl IntoIterator<Item = &'a File>) -> Self {
        self.uses.extend(files.into_iter().map(Use::input));
        self
    }

    pub fn add_outputs<'a>(
        mut self,
        files: impl IntoIterator<Item = &'a File>,
        stage_out: bool,
        register_replica: bool,
    ) -> Self {
        self.uses.extend(
            files
                .into_iter()
                .map(|f| Use::output(f, stage_out, register_replica)),
        );
        self
    }

    /// Files the job reads and rewrites in place.
    pub fn add_inouts<'a>(
        mut self,
        files: impl IntoIterator<Item = &'a File>,
        stage_out: bool,
        register_replica: bool,
    ) -> Self {
        self.uses.extend(
            files
                .into_iter()
                .map(|f| Use::inout(f, stage_out, register_replica)),
        );
        self
    }

    /// Feed `file` to the job's stdin; also records it as an input.
    pub fn set_stdin(mut self, file: &File) -> Self {
        self.stdin = Some(file.lfn.clone());
        self.uses.push(Use::input(file));
        self
    }

    /// Capture stdout into `file`; also records it as an output.
    pub fn set_stdout(mut self, file: &File, stage_out: bool, register_replica: bool) -> Self {
        self.stdout = Some(file.lfn.clone());
        self.uses
            .push(Use::output(file, stage_out, register_replica));
        self
    }

    /// Capture stderr into `file`; also records it as an output.
    pub fn set_stderr(mut self, file: &File, stage_out: bool, register_replica: bool) -> Self {
        self.stderr = Some(file.lfn.clone());
        self.uses
            .push(Use::output(file, stage_out, register_replica));
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

    pub fn add_condor_profile(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_profile(Namespace::Condor, key, value)
    }

    /// LFNs this job reads.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.uses
            .iter()
            .filter(|u| u.link_type.reads())
            .map(|u| u.lfn.as_str())
    }

    /// LFNs this job writes.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.uses
            .iter()
            .filter(|u| u.link_type.writes())
            .map(|u| u.lfn.as_str())
    }

    /// Arguments joined as they would appear on a command line.
    pub fn command_line(&self) -> String {
        self.arguments
            .iter()
            .map(Arg::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A named DAG of jobs.
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    infer_dependencies: bool,
    jobs: Vec<Job>,
    explicit: BTreeMap<String, BTreeSet<String>>,
    sequence: usize,
}

/// One `jobDependencies` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub id: String,
    pub children: Vec<String>,
}

#[derive(Serialize)]
struct JobDocument<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    job: &'a Job,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowDocument<'a> {
    #[serde(rename = "x-pegasus")]
    metadata: Metadata,
    pegasus: &'static str,
    name: &'a str,
    jobs: Vec<JobDocument<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    job_dependencies: Vec<Dependency>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, infer_dependencies: bool) -> Self {
        Self {
            name: name.into(),
            infer_dependencies,
            jobs: Vec::new(),
            explicit: BTreeMap::new(),
            sequence: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn infers_dependencies(&self) -> bool {
        self.infer_dependencies
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Add a job, assigning `ID0000001`-style ids to jobs without one.
    ///
    /// Returns the job's id.
    pub fn add_job(&mut self, mut job: Job) -> Result<String> {
        if job.id.is_empty() {
            job.id = self.next_id();
        } else if self.job(&job.id).is_some() {
            return Err(PipelineError::DuplicateJob(job.id));
        }
        debug!(id = %job.id, transformation = %job.name, "added job");
        let id = job.id.clone();
        self.jobs.push(job);
        Ok(id)
    }

    pub fn add_jobs(&mut self, jobs: impl IntoIterator<Item = Job>) -> Result<Vec<String>> {
        jobs.into_iter().map(|job| self.add_job(job)).collect()
    }

    /// Add an explicit `parent -> child` edge.
    pub fn add_dependency(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        self.explicit
            .entry(parent.into())
            .or_default()
            .insert(child.into());
    }

    fn next_id(&mut self) -> String {
        loop {
            self.sequence += 1;
            let id = format!("ID{:07}", self.sequence);
            if self.job(&id).is_none() {
                return id;
            }
        }
    }

    /// All edges as `parent -> children`: explicit ones plus inferred ones.
    pub fn dependencies(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut edges = self.explicit.clone();
        if !self.infer_dependencies {
            return edges;
        }

        let mut producers: HashMap<&str, &str> = HashMap::new();
        for job in &self.jobs {
            for lfn in job.outputs() {
                producers.entry(lfn).or_insert(job.id.as_str());
            }
        }
        for job in &self.jobs {
            for lfn in job.inputs() {
                if let Some(&parent) = producers.get(lfn)
                    && parent != job.id
                {
                    edges
                        .entry(parent.to_string())
                        .or_default()
                        .insert(job.id.clone());
                }
            }
        }
        edges
    }

    /// Dependencies in the `jobDependencies` document shape.
    pub fn dependency_list(&self) -> Vec<Dependency> {
        self.dependencies()
            .into_iter()
            .filter(|(_, children)| !children.is_empty())
            .map(|(id, children)| Dependency {
                id,
                children: children.into_iter().collect(),
            })
            .collect()
    }

    /// Validate the workflow.
    ///
    /// Checks:
    /// - Non-empty name and at least one job
    /// - Job ids are unique; each job names a transformation
    /// - A job does not declare the same file twice
    /// - Each file is written by at most one job
    /// - Explicit edges reference existing jobs
    /// - No cycles in the dependency graph
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::InvalidWorkflow(
                "Workflow name cannot be empty".into(),
            ));
        }
        if self.jobs.is_empty() {
            return Err(PipelineError::InvalidWorkflow(
                "Workflow must have at least one job".into(),
            ));
        }

        let mut seen_ids = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(PipelineError::InvalidWorkflow(format!(
                    "Job '{}' has no transformation name",
                    job.id
                )));
            }
            if !seen_ids.insert(job.id.as_str()) {
                return Err(PipelineError::DuplicateJob(job.id.clone()));
            }
            let mut lfns = HashSet::new();
            for u in &job.uses {
                if u.lfn.is_empty() {
                    return Err(PipelineError::InvalidWorkflow(format!(
                        "Job '{}' uses a file with an empty LFN",
                        job.id
                    )));
                }
                if !lfns.insert(u.lfn.as_str()) {
                    return Err(PipelineError::InvalidWorkflow(format!(
                        "Job '{}' declares file '{}' more than once",
                        job.id, u.lfn
                    )));
                }
            }
        }

        let mut producers: HashMap<&str, &str> = HashMap::new();
        for job in &self.jobs {
            for lfn in job.outputs() {
                if let Some(other) = producers.insert(lfn, job.id.as_str()) {
                    return Err(PipelineError::InvalidWorkflow(format!(
                        "File '{}' is produced by both '{}' and '{}'",
                        lfn, other, job.id
                    )));
                }
            }
        }

        for (parent, children) in &self.explicit {
            for id in std::iter::once(parent).chain(children) {
                if !seen_ids.contains(id.as_str()) {
                    return Err(PipelineError::InvalidWorkflow(format!(
                        "Dependency references unknown job '{}'",
                        id
                    )));
                }
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Job ids with every parent before its children.
    ///
    /// Ties are broken by insertion order. Fails if the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<&Job>> {
        let id_to_idx: HashMap<&str, usize> = self
            .jobs
            .iter()
            .enumerate()
            .map(|(i, j)| (j.id.as_str(), i))
            .collect();

        let n = self.jobs.len();
        let mut in_degree = vec![0usize; n];
        let mut adj: Vec<Vec<usize>> = vec![vec![]; n];

        for (parent, children) in self.dependencies() {
            let Some(&p) = id_to_idx.get(parent.as_str()) else {
                continue;
            };
            for child in children {
                if let Some(&c) = id_to_idx.get(child.as_str()) {
                    adj[p].push(c);
                    in_degree[c] += 1;
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> =
            (0..n).filter(|&i| in_degree[i] == 0).map(Reverse).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(Reverse(node)) = ready.pop() {
            order.push(&self.jobs[node]);
            for &neighbor in &adj[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    ready.push(Reverse(neighbor));
                }
            }
        }

        if order.len() != n {
            return Err(PipelineError::InvalidWorkflow(
                "Cycle detected in job dependencies".into(),
            ));
        }
        Ok(order)
    }

    pub fn to_yaml(&self) -> Result<String> {
        schema::to_yaml(
            "workflow",
            &WorkflowDocument {
                metadata: Metadata::now(),
                pegasus: PEGASUS_SCHEMA_VERSION,
                name: &self.name,
                jobs: self
                    .jobs
                    .iter()
                    .map(|job| JobDocument { kind: "job", job })
                    .collect(),
                job_dependencies: self.dependency_list(),
            },
        )
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        schema::write_file(path, &self.to_yaml()?)
    }
}
