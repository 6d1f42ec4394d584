// src/readiness/mod.rs

//! Dependency readiness evaluation.
//!
//! The evaluator walks a job's dependency edges and decides whether every
//! one of them is satisfied. It is re-run on every polling cycle — remote
//! state changes out of band, so nothing here is cached.

use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::lifecycle::JobStatus;
use crate::qc::run_qc;
use crate::remote::{map_vendor_status, RemoteService};
use crate::store::{EdgeTarget, Job, QcDelivery, Store};

/// Result of evaluating one dependency (or a whole job): whether it is
/// satisfied, plus any explanatory detail.
///
/// A satisfied result can still carry detail — the yield override keeps its
/// warning attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub detail: String,
}

impl Readiness {
    pub fn ready() -> Self {
        Self {
            ready: true,
            detail: String::new(),
        }
    }

    pub fn ready_with_warning(detail: impl Into<String>) -> Self {
        Self {
            ready: true,
            detail: detail.into(),
        }
    }

    pub fn blocked(detail: impl Into<String>) -> Self {
        Self {
            ready: false,
            detail: detail.into(),
        }
    }

    /// Merge per-edge results: ready iff all are, details concatenated.
    pub fn merge(results: impl IntoIterator<Item = Readiness>) -> Self {
        let mut ready = true;
        let mut details = Vec::new();
        for result in results {
            ready &= result.ready;
            if !result.detail.is_empty() {
                details.push(result.detail);
            }
        }
        Self {
            ready,
            detail: details.join("::"),
        }
    }
}

/// How an upstream job's result is judged ready for consumption, decided
/// once per app: apps with a QC descriptor must also pass automated QC,
/// everything else only has to finish.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamChecker {
    FinishedOnly,
    QcGated(QcDelivery),
}

impl UpstreamChecker {
    pub fn for_app(delivery: Option<QcDelivery>) -> Self {
        match delivery {
            Some(delivery) => UpstreamChecker::QcGated(delivery),
            None => UpstreamChecker::FinishedOnly,
        }
    }
}

/// Walks dependency edges and decides whether a job may be submitted.
pub struct Evaluator<'a> {
    store: &'a Store,
    remote: &'a dyn RemoteService,
    config: &'a ConfigFile,
    /// Treat samples with data but insufficient yield as ready; the warning
    /// stays in the detail.
    ignore_yield: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        store: &'a Store,
        remote: &'a dyn RemoteService,
        config: &'a ConfigFile,
        ignore_yield: bool,
    ) -> Self {
        Self {
            store,
            remote,
            config,
            ignore_yield,
        }
    }

    /// Evaluate every dependency edge of `job` and merge the results.
    pub async fn evaluate(&self, job: &Job) -> Result<Readiness> {
        let edges = self.store.edges_of(job)?;
        let mut results = Vec::with_capacity(edges.len());
        for edge in &edges {
            let result = match edge.target()? {
                EdgeTarget::Sample(sample_id) => self.sample_ready(job, sample_id).await?,
                EdgeTarget::Job(upstream_id) => self.upstream_ready(upstream_id).await?,
            };
            debug!(
                job = job.id,
                parameter = %edge.parameter,
                ready = result.ready,
                detail = %result.detail,
                "evaluated dependency edge"
            );
            results.push(result);
        }
        Ok(Readiness::merge(results))
    }

    /// A sample dependency is satisfied when the remote service holds data
    /// for it and the most recent bundle's yield exceeds the configured
    /// minimum.
    async fn sample_ready(&self, job: &Job, sample_id: i64) -> Result<Readiness> {
        let sample = self.store.sample_by_id(sample_id)?;
        let project = self.store.project_by_id(job.project_id)?;
        let bundles = self
            .remote
            .sample_bundles(&project.external_id, &sample.name)
            .await?;
        let Some(bundle) = bundles.first() else {
            return Ok(Readiness::blocked("No data"));
        };

        let observed = bundle.yield_bases()?;
        let minimum = self.config.limits.minimum_yield;
        if observed > minimum {
            Ok(Readiness::ready())
        } else if self.ignore_yield {
            Ok(Readiness::ready_with_warning(format!(
                "{}: yield {observed} below minimum {minimum} (ignored)",
                sample.name
            )))
        } else {
            Ok(Readiness::blocked(format!(
                "{}: yield {observed} below minimum {minimum}",
                sample.name
            )))
        }
    }

    /// An upstream-job dependency is satisfied when the upstream has been
    /// submitted and its result is consumable per its app's checker variant.
    async fn upstream_ready(&self, upstream_id: i64) -> Result<Readiness> {
        let upstream = self.store.job_by_id(upstream_id)?;
        let Some(execution_id) = upstream.execution_id.as_deref() else {
            return Ok(Readiness::blocked(format!(
                "job {} not started",
                upstream.id
            )));
        };

        let vendor_status = self.remote.status(execution_id).await?;
        let status = map_vendor_status(&self.config.status_mapping, &vendor_status)?;
        if status != JobStatus::AppFinished {
            return Ok(Readiness::blocked(format!(
                "job {} not finished",
                upstream.id
            )));
        }

        let app = self.store.app_by_id(upstream.app_id)?;
        let delivery = self.store.qc_delivery_of(&app)?;
        match UpstreamChecker::for_app(delivery) {
            UpstreamChecker::FinishedOnly => Ok(Readiness::ready()),
            UpstreamChecker::QcGated(delivery) => {
                let output_dir = self.store.job_output_dir(&upstream)?;
                let failures = run_qc(
                    &upstream,
                    &delivery,
                    &output_dir,
                    &self.config.download.log_dir_name,
                    self.remote,
                )
                .await?;
                if failures.is_empty() {
                    Ok(Readiness::ready())
                } else {
                    Ok(Readiness::blocked(failures.join(";")))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_ready_only_when_all_are() {
        let merged = Readiness::merge([Readiness::ready(), Readiness::blocked("No data")]);
        assert!(!merged.ready);
        assert_eq!(merged.detail, "No data");

        let merged = Readiness::merge([Readiness::ready(), Readiness::ready()]);
        assert!(merged.ready);
        assert!(merged.detail.is_empty());
    }

    #[test]
    fn merge_concatenates_details_with_separator() {
        let merged = Readiness::merge([
            Readiness::blocked("(Tumour: No data)"),
            Readiness::blocked("(Normal: No data)"),
        ]);
        assert_eq!(merged.detail, "(Tumour: No data)::(Normal: No data)");
    }

    #[test]
    fn warnings_survive_merging_on_ready_results() {
        let merged = Readiness::merge([
            Readiness::ready_with_warning("S1: yield 10 below minimum 20 (ignored)"),
            Readiness::ready(),
        ]);
        assert!(merged.ready);
        assert!(merged.detail.contains("ignored"));
    }

    #[test]
    fn checker_variant_follows_descriptor_presence() {
        assert_eq!(UpstreamChecker::for_app(None), UpstreamChecker::FinishedOnly);
        let delivery = QcDelivery {
            app_id: 1,
            result_name: None,
            metrics_extension: "csv".to_string(),
            thresholds: Default::default(),
            deliverables: Vec::new(),
        };
        assert!(matches!(
            UpstreamChecker::for_app(Some(delivery)),
            UpstreamChecker::QcGated(_)
        ));
    }
}
