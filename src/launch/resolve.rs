// src/launch/resolve.rs

//! Resolution of a job's dependency edges into concrete parameter values.
//!
//! The submit agent feeds the returned map straight into
//! [`LaunchSpecification::resolve`](crate::launch::LaunchSpecification);
//! `simulate` uses the identical path.

use std::collections::BTreeMap;

use crate::errors::{FlowdagError, Result};
use crate::launch::{ParamValue, PROJECT_PARAMETER};
use crate::remote::RemoteService;
use crate::store::{EdgeTarget, Job, Store};

/// Compute the parameter values satisfied by `job`'s dependency edges.
///
/// - The project parameter is implicit: every job receives its project's
///   remote id.
/// - A sample edge resolves to the remote id of the sample's most recent
///   data bundle.
/// - A job edge resolves to the remote id(s) of the upstream's output —
///   located through the upstream app's declared output when the edge names
///   one, or the result itself otherwise.
pub async fn resolve_dependency_values(
    store: &Store,
    remote: &dyn RemoteService,
    job: &Job,
) -> Result<BTreeMap<String, ParamValue>> {
    let project = store.project_by_id(job.project_id)?;
    let app = store.app_by_id(job.app_id)?;

    let mut values = BTreeMap::new();
    values.insert(
        PROJECT_PARAMETER.to_string(),
        ParamValue::scalar(project.external_id.clone()),
    );

    for edge in store.edges_of(job)? {
        let is_list = app
            .contract
            .iter()
            .find(|p| p.name == edge.parameter)
            .map(|p| p.is_list())
            .ok_or_else(|| {
                FlowdagError::Specification(format!(
                    "edge names parameter {} not in the contract of app {}",
                    edge.parameter, app.name
                ))
            })?;

        let value = match edge.target()? {
            EdgeTarget::Sample(sample_id) => {
                let sample = store.sample_by_id(sample_id)?;
                let bundles = remote
                    .sample_bundles(&project.external_id, &sample.name)
                    .await?;
                let bundle = bundles.first().ok_or_else(|| {
                    FlowdagError::Specification(format!(
                        "no remote data for sample: {}",
                        sample.name
                    ))
                })?;
                ParamValue::scalar(bundle.external_id.clone())
            }
            EdgeTarget::Job(upstream_id) => {
                let upstream = store.job_by_id(upstream_id)?;
                let execution_id = upstream.execution_id.as_deref().ok_or_else(|| {
                    FlowdagError::Specification(format!(
                        "upstream job {} has not been submitted",
                        upstream.id
                    ))
                })?;
                let upstream_app = store.app_by_id(upstream.app_id)?;

                let (result_name, path_glob) = match &edge.output_name {
                    Some(output_name) => {
                        let output = store
                            .output_by_name(&upstream_app, output_name)?
                            .ok_or_else(|| {
                                FlowdagError::MissingEntity(format!(
                                    "app {} supplies no output named {output_name}",
                                    upstream_app.name
                                ))
                            })?;
                        (Some(output.result_name), Some(output.path_glob))
                    }
                    None => (None, None),
                };

                let ids = remote
                    .locate_output(execution_id, result_name.as_deref(), path_glob.as_deref())
                    .await?;
                if ids.is_empty() {
                    return Err(FlowdagError::Specification(format!(
                        "no output located for parameter {} of job {}",
                        edge.parameter, job.id
                    )));
                }
                if is_list {
                    ParamValue::List(ids)
                } else if ids.len() == 1 {
                    ParamValue::Scalar(ids.into_iter().next().unwrap_or_default())
                } else {
                    return Err(FlowdagError::Specification(format!(
                        "parameter {} of job {} is scalar but {} outputs were located",
                        edge.parameter,
                        job.id,
                        ids.len()
                    )));
                }
            }
        };
        values.insert(edge.parameter.clone(), value);
    }

    Ok(values)
}
