// src/agents/submit.rs

//! Submit agent: evaluate readiness for `waiting` jobs, resolve and submit
//! the ready ones.

use tracing::{debug, error, info};

use crate::agents::AgentContext;
use crate::errors::Result;
use crate::launch::{resolve_dependency_values, LaunchPayload, LaunchSpecification};
use crate::lifecycle::{JobStatus, TransitionLog};
use crate::readiness::Evaluator;
use crate::store::{Job, Store};

/// One submit pass over the `waiting` set.
pub async fn submit_pass(ctx: &AgentContext<'_>, ignore_yield: bool) -> Result<TransitionLog> {
    debug!("starting submit pass");
    let jobs = ctx.working_set([JobStatus::Waiting])?;
    let evaluator = Evaluator::new(ctx.store, ctx.remote, ctx.config, ignore_yield);

    let mut transitions = TransitionLog::new();
    for job in &jobs {
        let summary = ctx.store.job_summary(job)?;
        let readiness = match evaluator.evaluate(job).await {
            Ok(readiness) => readiness,
            Err(e) => {
                error!(job = job.id, error = %e, "readiness evaluation failed");
                continue;
            }
        };

        if !readiness.ready {
            debug!(job = job.id, detail = %readiness.detail, "cannot submit");
            if !ctx.safe {
                ctx.store
                    .set_job_status(job, JobStatus::Waiting, &readiness.detail)?;
            }
            continue;
        }

        let payload = match build_payload(ctx, job).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(job = job.id, error = %e, "could not build launch payload");
                if !ctx.safe {
                    ctx.store.set_job_status(
                        job,
                        JobStatus::LaunchFailed,
                        &format!("payload resolution failed: {e}"),
                    )?;
                    transitions.record(job.id, job.status, JobStatus::LaunchFailed);
                }
                continue;
            }
        };

        if ctx.safe {
            info!(job = job.id, "would submit: {summary}");
            debug!(payload = %payload.to_json()?, "simulated payload");
            continue;
        }

        info!(job = job.id, "submitting: {summary}");
        let app = ctx.store.app_by_id(job.app_id)?;
        match ctx.remote.submit(&app.external_id, &payload).await {
            Ok(execution_id) => {
                info!(job = job.id, execution_id = %execution_id, "got execution id");
                ctx.store.set_execution_id(job, &execution_id)?;
                ctx.store.set_job_status(
                    job,
                    JobStatus::Submitted,
                    &format!("submission time: {}", crate::store::now_timestamp()),
                )?;
                transitions.record(job.id, job.status, JobStatus::Submitted);
            }
            Err(e) => {
                error!(job = job.id, error = %e, "submission failed");
                ctx.store.set_job_status(
                    job,
                    JobStatus::LaunchFailed,
                    &format!("submission failed: {e}"),
                )?;
                transitions.record(job.id, job.status, JobStatus::LaunchFailed);
            }
        }
    }

    transitions.report();
    debug!("finished submit pass");
    Ok(transitions)
}

/// Build the launch payload for one job. `simulate` calls this with exactly
/// the inputs `submit` uses, so the two always agree.
pub async fn build_payload(ctx: &AgentContext<'_>, job: &Job) -> Result<LaunchPayload> {
    let store = ctx.store;
    let app = store.app_by_id(job.app_id)?;
    let values = resolve_dependency_values(store, ctx.remote, job).await?;
    let spec = LaunchSpecification::new(&app.contract, &app.defaults, &ctx.config.service);
    spec.resolve(&values, &launch_label(store, job)?)
}

/// Human-readable launch label: the job's samples plus the app name.
fn launch_label(store: &Store, job: &Job) -> Result<String> {
    let app = store.app_by_id(job.app_id)?;
    let samples = store.job_sample_names(job)?;
    if samples.is_empty() {
        Ok(format!("{} ({})", app.name, job.id))
    } else {
        Ok(format!("{} : {}", samples.join("+"), app.name))
    }
}
