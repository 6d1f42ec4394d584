// src/agents/track.rs

//! Track agent: poll the remote service for live jobs and map the vendor
//! status onto the local lifecycle.

use tracing::{debug, error, info, warn};

use crate::agents::AgentContext;
use crate::errors::Result;
use crate::lifecycle::{JobStatus, TransitionLog};
use crate::remote::map_vendor_status;

/// One tracking pass over jobs with a live remote execution.
pub async fn track_pass(ctx: &AgentContext<'_>) -> Result<TransitionLog> {
    debug!("starting track pass");
    let jobs = ctx.working_set([
        JobStatus::Submitted,
        JobStatus::Pending,
        JobStatus::Running,
    ])?;

    let mut transitions = TransitionLog::new();
    for job in &jobs {
        let summary = ctx.store.job_summary(job)?;
        debug!(job = job.id, "working on: {summary}");

        let Some(execution_id) = job.execution_id.as_deref() else {
            warn!(job = job.id, "no execution id for job: {summary}");
            continue;
        };

        let new_status = match poll_status(ctx, execution_id).await {
            Ok(status) => status,
            Err(e) => {
                // unknown vendor statuses and remote failures are fatal to
                // this job's update, not to the pass
                error!(job = job.id, error = %e, "could not track job");
                continue;
            }
        };

        if ctx.safe {
            info!(job = job.id, "would update {summary} to: {new_status}");
            continue;
        }

        let changed = ctx.store.set_job_status(job, new_status, "")?;
        if changed {
            transitions.record(job.id, job.status, new_status);
        }
    }

    transitions.report();
    debug!("finished track pass");
    Ok(transitions)
}

async fn poll_status(ctx: &AgentContext<'_>, execution_id: &str) -> Result<JobStatus> {
    let vendor_status = ctx.remote.status(execution_id).await?;
    map_vendor_status(&ctx.config.status_mapping, &vendor_status)
}
