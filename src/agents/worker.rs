// src/agents/worker.rs

//! The per-job download worker.
//!
//! One process per job, spawned by the download dispatcher (or run
//! manually). Downloads every configured deliverable extension for the job
//! and records the terminal status itself — the dispatcher never waits.

use tracing::{error, info};

use crate::agents::AgentContext;
use crate::errors::{FlowdagError, Result};
use crate::lifecycle::JobStatus;

/// Download one job's deliverables and write `downloaded` or
/// `download-failed`.
pub async fn download_one(ctx: &AgentContext<'_>, job_id: i64) -> Result<()> {
    let job = ctx.store.job_by_id(job_id)?;
    let summary = ctx.store.job_summary(&job)?;
    info!(job = job.id, "downloading deliverables for: {summary}");

    match fetch_deliverables(ctx, job_id).await {
        Ok(()) => {
            ctx.store.set_job_status(&job, JobStatus::Downloaded, "")?;
            info!(job = job.id, "download complete");
            Ok(())
        }
        Err(e) => {
            error!(job = job.id, error = %e, "download failed");
            ctx.store
                .set_job_status(&job, JobStatus::DownloadFailed, &e.to_string())?;
            Err(e)
        }
    }
}

async fn fetch_deliverables(ctx: &AgentContext<'_>, job_id: i64) -> Result<()> {
    let job = ctx.store.job_by_id(job_id)?;
    let execution_id = job.execution_id.as_deref().ok_or_else(|| {
        FlowdagError::Remote(format!("job {} has no execution id", job.id))
    })?;

    let app = ctx.store.app_by_id(job.app_id)?;
    let delivery = ctx.store.qc_delivery_of(&app)?.ok_or_else(|| {
        FlowdagError::MissingEntity(format!("no deliverables configured for app: {}", app.name))
    })?;

    let output_dir = ctx.store.job_output_dir(&job)?;
    std::fs::create_dir_all(&output_dir)?;

    for extension in &delivery.deliverables {
        info!(extension = %extension, "downloading extension");
        let files = ctx
            .remote
            .download_files(
                execution_id,
                extension,
                &output_dir,
                delivery.result_name.as_deref(),
            )
            .await
            .map_err(|e| {
                FlowdagError::Remote(format!("failed to download {extension}: {e}"))
            })?;
        info!(count = files.len(), extension = %extension, "downloaded files");
    }
    Ok(())
}
