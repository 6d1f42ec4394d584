// src/workflow/mod.rs

//! Workflow construction: creating jobs and binding their dependency edges.
//!
//! A job's edges must exactly match its app's required parameter set (minus
//! the implicit project parameter), types must line up across chains, and
//! the resulting job graph must stay acyclic.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::{FlowdagError, Result};
use crate::store::{App, AppInput, Job, Sample, Store};

/// What one parameter of a new job is bound to.
#[derive(Debug, Clone)]
pub enum BindTarget {
    /// A sample, by name.
    Sample(String),
    /// The sample a relationship points to, e.g. the normal paired with a
    /// tumour: `RelatedSample { sample: "T1", kind: "TumourNormal" }`.
    RelatedSample { sample: String, kind: String },
    /// An upstream job's output; `output` of `None` means the job's result
    /// itself.
    JobOutput { job_id: i64, output: Option<String> },
}

pub struct WorkflowBuilder<'a> {
    store: &'a Store,
}

impl<'a> WorkflowBuilder<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Create a job for `app_name` in `project_name`, binding every required
    /// parameter to the given target.
    pub fn create_job(
        &self,
        app_name: &str,
        project_name: &str,
        bindings: &[(String, BindTarget)],
    ) -> Result<Job> {
        let app = self.store.app_by_name(app_name)?;
        let project = self.store.project_by_name(project_name)?;
        let inputs = self.store.inputs_of(&app)?;

        // the bound parameter set must exactly cover the declared inputs
        for input in &inputs {
            if !bindings.iter().any(|(name, _)| *name == input.name) {
                return Err(FlowdagError::Specification(format!(
                    "no binding for required parameter {} of app {}",
                    input.name, app.name
                )));
            }
        }
        for (name, _) in bindings {
            if !inputs.iter().any(|input| input.name == *name) {
                return Err(FlowdagError::Specification(format!(
                    "binding for unknown parameter {name} of app {}",
                    app.name
                )));
            }
        }

        let job = self.store.add_job(&app, &project)?;
        for (parameter, target) in bindings {
            let input = inputs
                .iter()
                .find(|input| input.name == *parameter)
                .ok_or_else(|| {
                    FlowdagError::Specification(format!("unknown parameter: {parameter}"))
                })?;
            self.bind(&job, input, target)?;
        }

        self.ensure_acyclic()?;
        debug!(job = job.id, app = %app.name, "created job with dependencies");
        Ok(job)
    }

    /// Shortcut for the common case: one job per sample, for an app whose
    /// contract requires exactly one sample parameter. Idempotent — calling
    /// it again for the same (sample, app) returns the existing job.
    pub fn add_sample_app(&self, sample_name: &str, app_name: &str) -> Result<Job> {
        let sample = self.store.sample_by_name(sample_name)?;
        let app = self.store.app_by_name(app_name)?;
        let project = self.store.project_by_id(sample.project_id)?;

        let parameter = self.single_sample_parameter(&app)?;

        // re-registration returns the existing job
        let existing = self.store.jobs_by_constraints(&crate::store::JobConstraints {
            app: Some(app.name.clone()),
            project: Some(project.name.clone()),
            exact: true,
            ..Default::default()
        })?;
        for candidate in existing {
            let edges = self.store.edges_of(&candidate)?;
            if edges
                .iter()
                .any(|e| e.parameter == parameter && e.sample_id == Some(sample.id))
            {
                return Ok(candidate);
            }
        }

        let job = self.store.add_job(&app, &project)?;
        self.store
            .add_dependency_edge(&job, &parameter, Some(&sample), None, None)?;
        Ok(job)
    }

    fn single_sample_parameter(&self, app: &App) -> Result<String> {
        let inputs = self.store.inputs_of(app)?;
        let mut sample_inputs = inputs.iter().filter(|input| input.kind == "sample");
        let first = sample_inputs.next().ok_or_else(|| {
            FlowdagError::Specification(format!(
                "app {} has no sample parameter to bind",
                app.name
            ))
        })?;
        if sample_inputs.next().is_some() {
            return Err(FlowdagError::Specification(format!(
                "app {} has more than one sample parameter; bind them explicitly",
                app.name
            )));
        }
        Ok(first.name.clone())
    }

    fn bind(&self, job: &Job, input: &AppInput, target: &BindTarget) -> Result<()> {
        match target {
            BindTarget::Sample(sample_name) => {
                let sample = self.store.sample_by_name(sample_name)?;
                self.bind_sample(job, input, &sample)?;
            }
            BindTarget::RelatedSample { sample, kind } => {
                let from = self.store.sample_by_name(sample)?;
                let related = self.store.related_sample(&from, kind)?;
                self.bind_sample(job, input, &related)?;
            }
            BindTarget::JobOutput { job_id, output } => {
                let upstream = self.store.job_by_id(*job_id)?;
                if let Some(output_name) = output {
                    let upstream_app = self.store.app_by_id(upstream.app_id)?;
                    let supplied = self
                        .store
                        .output_by_name(&upstream_app, output_name)?
                        .ok_or_else(|| {
                            FlowdagError::MissingEntity(format!(
                                "app {} supplies no output named {output_name}",
                                upstream_app.name
                            ))
                        })?;
                    // semantic kinds must agree when both sides declare one
                    if let Some(expected) = input.description.as_deref() {
                        if !expected.is_empty()
                            && !supplied.kind.is_empty()
                            && expected != supplied.kind
                        {
                            return Err(FlowdagError::Specification(format!(
                                "parameter {} expects {expected} but output {output_name} supplies {}",
                                input.name, supplied.kind
                            )));
                        }
                    }
                }
                self.store.add_dependency_edge(
                    job,
                    &input.name,
                    None,
                    Some(&upstream),
                    output.as_deref(),
                )?;
            }
        }
        Ok(())
    }

    fn bind_sample(&self, job: &Job, input: &AppInput, sample: &Sample) -> Result<()> {
        if input.kind != "sample" {
            return Err(FlowdagError::Specification(format!(
                "parameter {} expects {}, not a sample",
                input.name, input.kind
            )));
        }
        if sample.project_id != job.project_id {
            return Err(FlowdagError::Specification(format!(
                "sample {} belongs to a different project than job {}",
                sample.name, job.id
            )));
        }
        self.store
            .add_dependency_edge(job, &input.name, Some(sample), None, None)?;
        Ok(())
    }

    /// Reject edge sets that would make the job graph cyclic.
    fn ensure_acyclic(&self) -> Result<()> {
        let mut graph: DiGraphMap<i64, ()> = DiGraphMap::new();
        for (upstream, dependent) in self.store.job_dependency_pairs()? {
            graph.add_edge(upstream, dependent, ());
        }
        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(FlowdagError::DependencyCycle(format!(
                "cycle involving job {}",
                cycle.node_id()
            ))),
        }
    }
}
