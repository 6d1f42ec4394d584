// src/agents/download.rs

//! Download agent: fan out per-job download workers for `qc-passed` jobs,
//! never exceeding the configured concurrency cap.

use tracing::{debug, error, info};

use crate::agents::{AgentContext, ProcessLauncher};
use crate::errors::{FlowdagError, Result};
use crate::lifecycle::{JobStatus, TransitionLog};

/// One dispatch pass over the `qc-passed` set.
///
/// Jobs are taken in query order, filling `max_concurrent - running` slots.
/// A worker that fails to *start* marks its job `download-failed` and aborts
/// the rest of the pass: a spawn failure points at a systemic problem
/// (resource exhaustion, broken worker command) that would recur for every
/// remaining slot.
pub async fn download_pass(
    ctx: &AgentContext<'_>,
    launcher: &mut dyn ProcessLauncher,
) -> Result<TransitionLog> {
    debug!("starting download pass");
    let eligible = ctx.working_set([JobStatus::QcPassed])?;

    let mut transitions = TransitionLog::new();
    if eligible.is_empty() {
        debug!("nothing to download");
        return Ok(transitions);
    }

    let running = ctx.store.count_jobs_with_status(JobStatus::Downloading)?;
    let max_concurrent = ctx.config.limits.max_concurrent_downloads;
    info!(running, max_concurrent, "checking download slots");
    let slots = max_concurrent.saturating_sub(running);

    for job in eligible.iter().take(slots) {
        let summary = ctx.store.job_summary(job)?;
        let command = worker_command(ctx, job.id);

        if ctx.safe {
            debug!(job = job.id, "would download: {summary}");
            debug!(command = %command.join(" "), "would use command");
            continue;
        }

        info!(command = %command.join(" "), "executing download command");
        match launcher.launch(&command).await {
            Ok(pid) => {
                info!(job = job.id, pid, "launched download process");
                ctx.store
                    .set_job_status(job, JobStatus::Downloading, &format!("pid: {pid}"))?;
                transitions.record(job.id, job.status, JobStatus::Downloading);
            }
            Err(e) => {
                error!(job = job.id, error = %e, "failed to launch download worker");
                ctx.store.set_job_status(
                    job,
                    JobStatus::DownloadFailed,
                    &format!("{} : {e}", command.join(" ")),
                )?;
                transitions.record(job.id, job.status, JobStatus::DownloadFailed);
                transitions.report();
                return Err(FlowdagError::Remote(format!(
                    "download dispatch aborted: failed to launch worker for job {}: {e}",
                    job.id
                )));
            }
        }
    }

    transitions.report();
    debug!("finished download pass");
    Ok(transitions)
}

fn worker_command(ctx: &AgentContext<'_>, job_id: i64) -> Vec<String> {
    let mut command = ctx.config.download.worker.clone();
    command.push("--id".to_string());
    command.push(job_id.to_string());
    command
}
