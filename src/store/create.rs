// src/store/create.rs

//! Entity creation. Duplicate handling follows the contracts in the data
//! model: samples, relationships and dependency edges are idempotent;
//! projects, apps and their descriptors are hard conflicts.

use std::collections::BTreeMap;

use globset::Glob;
use rusqlite::params;

use crate::errors::{FlowdagError, Result};
use crate::launch::{ParamValue, ParameterSpec, PROJECT_PARAMETER};
use crate::lifecycle::JobStatus;
use crate::qc::thresholds::parse_thresholds;
use crate::store::model::{App, AppOutput, DependencyEdge, Job, Project, Sample, SampleRelationship};
use crate::store::{is_constraint_violation, now_timestamp, Store};

impl Store {
    pub fn add_project(
        &self,
        name: &str,
        output_path: &str,
        external_id: &str,
    ) -> Result<Project> {
        let result = self.conn().execute(
            "INSERT INTO projects (name, output_path, external_id) VALUES (?1, ?2, ?3)",
            params![name, output_path, external_id],
        );
        match result {
            Ok(_) => self.project_by_name(name),
            Err(e) if is_constraint_violation(&e) => Err(FlowdagError::AlreadyExists(format!(
                "project already exists: {name}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Idempotent: re-adding an existing sample returns the existing record.
    pub fn add_sample(&self, name: &str, project: &Project) -> Result<Sample> {
        if let Ok(existing) = self.sample_by_name(name) {
            return Ok(existing);
        }
        self.conn().execute(
            "INSERT INTO samples (name, project_id, created) VALUES (?1, ?2, ?3)",
            params![name, project.id, now_timestamp()],
        )?;
        self.sample_by_name(name)
    }

    /// Idempotent per (from, to, kind) triple.
    pub fn add_sample_relationship(
        &self,
        from: &Sample,
        to: &Sample,
        kind: &str,
    ) -> Result<SampleRelationship> {
        let result = self.conn().execute(
            "INSERT INTO sample_relationships (from_sample, to_sample, kind) VALUES (?1, ?2, ?3)",
            params![from.id, to.id, kind],
        );
        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {}
            Err(e) => return Err(e.into()),
        }
        self.relationship(from, to, kind)
    }

    /// Register an app. Its input descriptions are derived from the contract
    /// the way the launch resolver will read it: every parameter without a
    /// default, minus the implicit project parameter.
    pub fn add_app(
        &self,
        name: &str,
        external_id: &str,
        contract: &[ParameterSpec],
        defaults: &BTreeMap<String, ParamValue>,
        input_descriptions: &BTreeMap<String, String>,
    ) -> Result<App> {
        let contract_blob = serde_json::to_string(contract)?;
        let defaults_blob = serde_json::to_string(defaults)?;
        let result = self.conn().execute(
            "INSERT INTO apps (name, external_id, contract, defaults) VALUES (?1, ?2, ?3, ?4)",
            params![name, external_id, contract_blob, defaults_blob],
        );
        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(FlowdagError::AlreadyExists(format!(
                    "app already exists: {name}"
                )));
            }
            Err(e) => return Err(e.into()),
        }
        let app = self.app_by_name(name)?;

        // One input row per required contract parameter; the project
        // parameter is implicit and never satisfied by an edge.
        for param_spec in &app.contract {
            if param_spec.name == PROJECT_PARAMETER || app.defaults.contains_key(&param_spec.name)
            {
                continue;
            }
            self.add_app_input(
                &app,
                &param_spec.name,
                &param_spec.bald_type(),
                param_spec.is_list(),
                input_descriptions.get(&param_spec.name).map(String::as_str),
            )?;
        }
        Ok(app)
    }

    pub fn add_app_input(
        &self,
        app: &App,
        name: &str,
        kind: &str,
        is_list: bool,
        description: Option<&str>,
    ) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO app_inputs (app_id, name, kind, is_list, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![app.id, name, kind, is_list, description],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(FlowdagError::AlreadyExists(format!(
                "app input already exists: {name}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Declare a named output. The path glob is validated here so a bad
    /// pattern fails at registration rather than at resolution time.
    pub fn add_app_output(
        &self,
        app: &App,
        name: &str,
        result_name: &str,
        kind: &str,
        path_glob: &str,
    ) -> Result<AppOutput> {
        Glob::new(path_glob).map_err(|e| {
            FlowdagError::FormatError(format!("bad path glob for output {name}: {e}"))
        })?;
        let result = self.conn().execute(
            "INSERT INTO app_outputs (app_id, name, result_name, kind, path_glob)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![app.id, name, result_name, kind, path_glob],
        );
        match result {
            Ok(_) => self.output_by_name(app, name)?.ok_or_else(|| {
                FlowdagError::MissingEntity(format!("app output vanished: {name}"))
            }),
            Err(e) if is_constraint_violation(&e) => Err(FlowdagError::AlreadyExists(format!(
                "app output already exists: {name}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Attach the QC-and-delivery descriptor. The threshold blob is parsed
    /// here, so malformed operator names fail fast.
    pub fn add_qc_delivery(
        &self,
        app: &App,
        result_name: Option<&str>,
        metrics_extension: &str,
        thresholds_blob: &str,
        deliverables: &[String],
    ) -> Result<()> {
        parse_thresholds(thresholds_blob)?;
        let deliverables_blob = deliverables.join(",");
        let result = self.conn().execute(
            "INSERT INTO app_qc_delivery (app_id, result_name, metrics_extension, thresholds, deliverables)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![app.id, result_name, metrics_extension, thresholds_blob, deliverables_blob],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(FlowdagError::AlreadyExists(format!(
                "QC and delivery already exists for app: {}",
                app.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a job in the default status.
    pub fn add_job(&self, app: &App, project: &Project) -> Result<Job> {
        self.conn().execute(
            "INSERT INTO jobs (app_id, project_id, status, details, last_updated)
             VALUES (?1, ?2, ?3, '', ?4)",
            params![
                app.id,
                project.id,
                JobStatus::default_status().as_str(),
                now_timestamp()
            ],
        )?;
        let id = self.conn().last_insert_rowid();
        self.job_by_id(id)
    }

    /// Create a dependency edge for `job`'s `parameter`.
    ///
    /// The edge must target exactly one of a sample or an upstream job;
    /// anything else is a format error. Re-adding an edge with an identical
    /// target is a no-op returning the existing edge; re-binding the
    /// parameter to a different target is a conflict.
    pub fn add_dependency_edge(
        &self,
        job: &Job,
        parameter: &str,
        sample: Option<&Sample>,
        upstream: Option<&Job>,
        output_name: Option<&str>,
    ) -> Result<DependencyEdge> {
        match (sample, upstream) {
            (Some(_), Some(_)) => {
                return Err(FlowdagError::FormatError(format!(
                    "dependency edge for {parameter} targets both a sample and a job"
                )));
            }
            (None, None) => {
                return Err(FlowdagError::FormatError(format!(
                    "dependency edge for {parameter} targets neither a sample nor a job"
                )));
            }
            _ => {}
        }

        let result = self.conn().execute(
            "INSERT INTO dependency_edges (job_id, parameter, sample_id, upstream_job_id, output_name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.id,
                parameter,
                sample.map(|s| s.id),
                upstream.map(|j| j.id),
                output_name
            ],
        );
        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                let existing = self
                    .edges_of(job)?
                    .into_iter()
                    .find(|edge| edge.parameter == parameter)
                    .ok_or(FlowdagError::SqlError(e))?;
                let same_target = existing.sample_id == sample.map(|s| s.id)
                    && existing.upstream_job_id == upstream.map(|j| j.id)
                    && existing.output_name.as_deref() == output_name;
                if same_target {
                    return Ok(existing);
                }
                return Err(FlowdagError::AlreadyExists(format!(
                    "parameter {parameter} of job {} is already bound to a different target",
                    job.id
                )));
            }
            Err(e) => return Err(e.into()),
        }
        let id = self.conn().last_insert_rowid();
        self.edge_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> (Store, Project, App) {
        let store = Store::open_in_memory().unwrap();
        let project = store.add_project("ProjX", "/data/projx", "77").unwrap();
        let contract = vec![
            ParameterSpec::new("project-id", "project"),
            ParameterSpec::new("sample-id", "sample"),
        ];
        let app = store
            .add_app("Resequencing", "901", &contract, &BTreeMap::new(), &BTreeMap::new())
            .unwrap();
        (store, project, app)
    }

    #[test]
    fn duplicate_project_is_a_conflict() {
        let (store, _project, _app) = seeded_store();
        let err = store.add_project("ProjX", "/other", "78").unwrap_err();
        assert!(matches!(err, FlowdagError::AlreadyExists(_)));
    }

    #[test]
    fn sample_creation_is_idempotent() {
        let (store, project, _app) = seeded_store();
        let first = store.add_sample("NA12878", &project).unwrap();
        let second = store.add_sample("NA12878", &project).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn relationship_triple_is_idempotent() {
        let (store, project, _app) = seeded_store();
        let tumour = store.add_sample("T1", &project).unwrap();
        let normal = store.add_sample("N1", &project).unwrap();
        let first = store
            .add_sample_relationship(&tumour, &normal, "TumourNormal")
            .unwrap();
        let second = store
            .add_sample_relationship(&tumour, &normal, "TumourNormal")
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn app_inputs_derived_from_contract_skip_project() {
        let (store, _project, app) = seeded_store();
        let inputs = store.inputs_of(&app).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].name, "sample-id");
        assert_eq!(inputs[0].kind, "sample");
        assert!(!inputs[0].is_list);
    }

    #[test]
    fn edge_requires_exactly_one_target() {
        let (store, project, app) = seeded_store();
        let sample = store.add_sample("NA12878", &project).unwrap();
        let job = store.add_job(&app, &project).unwrap();
        let upstream = store.add_job(&app, &project).unwrap();

        let both = store.add_dependency_edge(
            &job,
            "sample-id",
            Some(&sample),
            Some(&upstream),
            None,
        );
        assert!(matches!(both, Err(FlowdagError::FormatError(_))));

        let neither = store.add_dependency_edge(&job, "sample-id", None, None, None);
        assert!(matches!(neither, Err(FlowdagError::FormatError(_))));
    }

    #[test]
    fn identical_edge_readd_is_a_noop() {
        let (store, project, app) = seeded_store();
        let sample = store.add_sample("NA12878", &project).unwrap();
        let job = store.add_job(&app, &project).unwrap();

        let first = store
            .add_dependency_edge(&job, "sample-id", Some(&sample), None, None)
            .unwrap();
        let second = store
            .add_dependency_edge(&job, "sample-id", Some(&sample), None, None)
            .unwrap();
        assert_eq!(first.id, second.id);

        let other = store.add_sample("NA12877", &project).unwrap();
        let rebind = store.add_dependency_edge(&job, "sample-id", Some(&other), None, None);
        assert!(matches!(rebind, Err(FlowdagError::AlreadyExists(_))));
    }

    #[test]
    fn bad_threshold_blob_fails_at_registration() {
        let (store, _project, app) = seeded_store();
        let err = store
            .add_qc_delivery(&app, None, ".csv", r#"{"m": {"operator": "??", "threshold": 1}}"#, &[])
            .unwrap_err();
        assert!(matches!(err, FlowdagError::FormatError(_)));
    }

    #[test]
    fn bad_output_glob_fails_at_registration() {
        let (store, _project, app) = seeded_store();
        let err = store
            .add_app_output(&app, "genome-vcf", "Variants", "vcf", "a{b")
            .unwrap_err();
        assert!(matches!(err, FlowdagError::FormatError(_)));
    }
}
