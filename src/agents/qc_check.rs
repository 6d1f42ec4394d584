// src/agents/qc_check.rs

//! QC agent: apply automated QC to `app-finished` jobs and publish the
//! verdict, both locally and as metadata on the remote execution.

use tracing::{debug, error, info, warn};

use crate::agents::AgentContext;
use crate::errors::Result;
use crate::lifecycle::{JobStatus, TransitionLog};
use crate::qc::run_qc;
use crate::store::Job;

/// One QC pass over the `app-finished` set.
pub async fn qc_pass(ctx: &AgentContext<'_>) -> Result<TransitionLog> {
    debug!("starting qc pass");
    let jobs = ctx.working_set([JobStatus::AppFinished])?;

    let mut transitions = TransitionLog::new();
    for job in &jobs {
        let summary = ctx.store.job_summary(job)?;
        debug!(job = job.id, "working on: {summary}");

        let Some(execution_id) = job.execution_id.clone() else {
            warn!(job = job.id, "no execution id for job: {summary}");
            continue;
        };

        let failures = match apply_qc(ctx, job).await {
            Ok(failures) => failures,
            Err(e) => {
                // a missing metrics file or metric is a contract mismatch;
                // leave the job for operator attention rather than failing QC
                error!(job = job.id, error = %e, "could not apply QC");
                continue;
            }
        };

        let (new_status, details) = match failures {
            Some(failures) if !failures.is_empty() => {
                debug!(job = job.id, "failed: {}", failures.join(";"));
                (JobStatus::QcFailed, failures.join(";"))
            }
            Some(_) => (JobStatus::QcPassed, String::new()),
            // no descriptor: nothing to check, the job passes through
            None => (JobStatus::QcPassed, "no QC thresholds configured".to_string()),
        };

        if ctx.safe {
            info!(job = job.id, "would update {summary} to: {new_status}");
            continue;
        }

        let changed = ctx.store.set_job_status(job, new_status, &details)?;
        if changed {
            transitions.record(job.id, job.status, new_status);
        }

        let mut values = vec![("QCResult".to_string(), new_status.to_string())];
        if !details.is_empty() {
            values.push(("QCDetails".to_string(), details.clone()));
        }
        if let Err(e) = ctx
            .remote
            .set_metadata(&execution_id, &ctx.config.service.qc_namespace, &values)
            .await
        {
            error!(job = job.id, error = %e, "failed to publish QC verdict");
        }
    }

    transitions.report();
    debug!("finished qc pass");
    Ok(transitions)
}

/// Run QC for one job. `Ok(None)` means the app has no QC descriptor.
async fn apply_qc(ctx: &AgentContext<'_>, job: &Job) -> Result<Option<Vec<String>>> {
    let app = ctx.store.app_by_id(job.app_id)?;
    let Some(delivery) = ctx.store.qc_delivery_of(&app)? else {
        return Ok(None);
    };
    let output_dir = ctx.store.job_output_dir(job)?;
    let failures = run_qc(
        job,
        &delivery,
        &output_dir,
        &ctx.config.download.log_dir_name,
        ctx.remote,
    )
    .await?;
    Ok(Some(failures))
}
