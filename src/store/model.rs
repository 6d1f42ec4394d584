// src/store/model.rs

//! Entity structs and row mapping.

use std::collections::BTreeMap;

use rusqlite::Row;

use crate::errors::{FlowdagError, Result};
use crate::launch::{ParamValue, ParameterSpec};
use crate::lifecycle::JobStatus;
use crate::qc::thresholds::ThresholdMap;

/// A project: created once by provisioning tooling, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub output_path: String,
    /// The remote service's identifier for this project.
    pub external_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    pub created: String,
}

/// Directed relationship between two samples, e.g. tumour → normal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRelationship {
    pub id: i64,
    pub from_sample: i64,
    pub to_sample: i64,
    pub kind: String,
}

/// An immutable job type definition: the parameter contract, defaults, and
/// (separately stored) inputs, outputs and QC descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct App {
    pub id: i64,
    pub name: String,
    /// The remote service's identifier for this app.
    pub external_id: String,
    pub contract: Vec<ParameterSpec>,
    pub defaults: BTreeMap<String, ParamValue>,
}

impl App {
    /// App name reduced to a filesystem/identifier-safe form: invalid
    /// characters removed, leading non-letters stripped.
    pub fn flat_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        cleaned
            .trim_start_matches(|c: char| !(c.is_ascii_alphabetic() || c == '_'))
            .to_string()
    }
}

/// Declares one parameter an app consumes: semantic kind, list-ness and an
/// optional description used to check type compatibility across job chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInput {
    pub id: i64,
    pub app_id: i64,
    pub name: String,
    pub kind: String,
    pub is_list: bool,
    pub description: Option<String>,
}

/// Declares one named output an app supplies, so a downstream job can
/// consume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOutput {
    pub id: i64,
    pub app_id: i64,
    pub name: String,
    /// Which of the app's results the output comes from.
    pub result_name: String,
    pub kind: String,
    /// Glob locating the output file(s) within the result.
    pub path_glob: String,
}

/// Per-app QC-and-delivery descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct QcDelivery {
    pub app_id: i64,
    /// Which result to inspect; `None` means the app's only result.
    pub result_name: Option<String>,
    /// Extension of the metrics file within that result.
    pub metrics_extension: String,
    pub thresholds: ThresholdMap,
    /// File extensions that constitute the deliverable.
    pub deliverables: Vec<String>,
}

/// One instantiation of an app for a project, tracked through the lifecycle
/// state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: i64,
    pub app_id: i64,
    pub project_id: i64,
    /// The remote service's execution identifier; null until submitted.
    pub execution_id: Option<String>,
    pub status: JobStatus,
    pub details: String,
    pub last_updated: String,
}

/// A typed link from one of a job's parameters to either a sample or an
/// upstream job's named output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub id: i64,
    pub job_id: i64,
    pub parameter: String,
    pub sample_id: Option<i64>,
    pub upstream_job_id: Option<i64>,
    /// When targeting a job: which of its named outputs, if any.
    pub output_name: Option<String>,
}

/// The edge's target, with mutual exclusivity already enforced at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeTarget {
    Sample(i64),
    Job(i64),
}

impl DependencyEdge {
    pub fn target(&self) -> Result<EdgeTarget> {
        match (self.sample_id, self.upstream_job_id) {
            (Some(sample), None) => Ok(EdgeTarget::Sample(sample)),
            (None, Some(job)) => Ok(EdgeTarget::Job(job)),
            _ => Err(FlowdagError::FormatError(format!(
                "dependency edge {} must target exactly one of sample or job",
                self.id
            ))),
        }
    }
}

/// Constraints for job queries. `id` short-circuits everything else.
#[derive(Debug, Clone, Default)]
pub struct JobConstraints {
    pub id: Option<i64>,
    pub statuses: Vec<JobStatus>,
    pub project: Option<String>,
    pub sample: Option<String>,
    pub app: Option<String>,
    /// Exact name matching instead of substring.
    pub exact: bool,
}

impl JobConstraints {
    pub fn with_statuses(statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

pub(crate) fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        output_path: row.get(2)?,
        external_id: row.get(3)?,
    })
}

pub(crate) fn row_to_sample(row: &Row<'_>) -> rusqlite::Result<Sample> {
    Ok(Sample {
        id: row.get(0)?,
        name: row.get(1)?,
        project_id: row.get(2)?,
        created: row.get(3)?,
    })
}

pub(crate) fn row_to_relationship(row: &Row<'_>) -> rusqlite::Result<SampleRelationship> {
    Ok(SampleRelationship {
        id: row.get(0)?,
        from_sample: row.get(1)?,
        to_sample: row.get(2)?,
        kind: row.get(3)?,
    })
}

pub(crate) fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<DependencyEdge> {
    Ok(DependencyEdge {
        id: row.get(0)?,
        job_id: row.get(1)?,
        parameter: row.get(2)?,
        sample_id: row.get(3)?,
        upstream_job_id: row.get(4)?,
        output_name: row.get(5)?,
    })
}

pub(crate) fn row_to_input(row: &Row<'_>) -> rusqlite::Result<AppInput> {
    Ok(AppInput {
        id: row.get(0)?,
        app_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        is_list: row.get(4)?,
        description: row.get(5)?,
    })
}

pub(crate) fn row_to_output(row: &Row<'_>) -> rusqlite::Result<AppOutput> {
    Ok(AppOutput {
        id: row.get(0)?,
        app_id: row.get(1)?,
        name: row.get(2)?,
        result_name: row.get(3)?,
        kind: row.get(4)?,
        path_glob: row.get(5)?,
    })
}

/// Jobs parse their status string; unknown strings stored by some future
/// version are surfaced as errors rather than silently skipped.
pub(crate) fn row_to_job(row: &Row<'_>) -> rusqlite::Result<(Job, String)> {
    let status_raw: String = row.get(4)?;
    Ok((
        Job {
            id: row.get(0)?,
            app_id: row.get(1)?,
            project_id: row.get(2)?,
            execution_id: row.get(3)?,
            status: JobStatus::Waiting,
            details: row.get(5)?,
            last_updated: row.get(6)?,
        },
        status_raw,
    ))
}

pub(crate) fn finish_job(pair: (Job, String)) -> Result<Job> {
    let (mut job, status_raw) = pair;
    job.status = status_raw.parse()?;
    Ok(job)
}
