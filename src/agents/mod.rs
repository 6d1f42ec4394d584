// src/agents/mod.rs

//! The four polling agents.
//!
//! Each agent is one batch pass: select jobs by status filter (or the
//! explicit `--id` override), act on each, write statuses back only on
//! change, and report a transition summary at the end. Agents never talk to
//! each other; the store's status column is the only coordination channel.
//!
//! - [`submit`] moves ready `waiting` jobs to `submitted`.
//! - [`track`] polls remote status for live jobs.
//! - [`qc_check`] applies automated QC to finished jobs.
//! - [`download`] fans out download workers under the concurrency cap.
//! - [`worker`] is the per-job download process the dispatcher launches.
//! - [`launcher`] abstracts process spawning so dispatch is testable.

pub mod download;
pub mod launcher;
pub mod qc_check;
pub mod submit;
pub mod track;
pub mod worker;

pub use launcher::{DetachedLauncher, ProcessLauncher};

use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::lifecycle::JobStatus;
use crate::remote::RemoteService;
use crate::store::{Job, JobConstraints, Store};

/// Everything an agent pass needs, constructed by the process entry point
/// and passed down explicitly.
pub struct AgentContext<'a> {
    pub store: &'a Store,
    pub remote: &'a dyn RemoteService,
    pub config: &'a ConfigFile,
    /// Safe mode: take the same decisions but only log them.
    pub safe: bool,
    /// Restrict the working set to one explicit job.
    pub only_job: Option<i64>,
}

impl AgentContext<'_> {
    /// The jobs this pass operates on. The id override bypasses the status
    /// filter so a stuck job can be poked manually.
    pub fn working_set(&self, statuses: impl IntoIterator<Item = JobStatus>) -> Result<Vec<Job>> {
        let constraints = match self.only_job {
            Some(id) => JobConstraints::with_id(id),
            None => JobConstraints::with_statuses(statuses),
        };
        let jobs = self.store.jobs_by_constraints(&constraints)?;
        debug!(count = jobs.len(), "working set selected");
        Ok(jobs)
    }
}
