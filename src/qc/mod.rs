// src/qc/mod.rs

//! Automated QC: fetch a finished job's metrics file, parse it, and compare
//! the metrics against the app's configured thresholds.
//!
//! - [`metrics`] holds the two flat-key extraction strategies, selected by
//!   file extension.
//! - [`thresholds`] holds the operator enum and comparison.

pub mod metrics;
pub mod thresholds;

use std::path::Path;

use tracing::debug;

use crate::errors::{FlowdagError, Result};
use crate::qc::thresholds::check_metric;
use crate::remote::RemoteService;
use crate::store::{Job, QcDelivery};

/// Apply automated QC to a finished job's result.
///
/// Downloads the single metrics file matching the descriptor's extension
/// into `<output_dir>/<log_dir_name>`, parses it, and returns descriptions
/// of the failing metrics (empty means the job passed QC).
///
/// Errors are reserved for situations where QC could not be applied at all:
/// zero or multiple metrics files, an unparseable file, or a threshold
/// metric absent from the parsed results (a contract mismatch rather than a
/// genuine threshold violation).
pub async fn run_qc(
    job: &Job,
    delivery: &QcDelivery,
    output_dir: &Path,
    log_dir_name: &str,
    remote: &dyn RemoteService,
) -> Result<Vec<String>> {
    let execution_id = job.execution_id.as_deref().ok_or_else(|| {
        FlowdagError::Qc(format!("job {} has no execution id", job.id))
    })?;

    let qc_dir = output_dir.join(log_dir_name);
    std::fs::create_dir_all(&qc_dir)?;

    debug!(
        execution_id,
        extension = %delivery.metrics_extension,
        "retrieving metrics file"
    );
    let files = remote
        .download_files(
            execution_id,
            &delivery.metrics_extension,
            &qc_dir,
            delivery.result_name.as_deref(),
        )
        .await?;
    if files.len() != 1 {
        return Err(FlowdagError::Qc(format!(
            "did not get exactly one metrics file for QC (got {})",
            files.len()
        )));
    }
    debug!(file = %files[0].display(), "got metrics file");

    let results = metrics::parse_metrics(&files[0])?;

    let mut failures = Vec::new();
    for (name, threshold) in &delivery.thresholds {
        let observed = results.get(name).ok_or_else(|| {
            FlowdagError::Qc(format!("metric missing from qc results: {name}"))
        })?;
        if let Some(failure) = check_metric(name, observed, threshold) {
            failures.push(failure);
        }
    }
    Ok(failures)
}
