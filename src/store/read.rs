// src/store/read.rs

//! Queries. Missing entities are errors, never auto-created.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::errors::{FlowdagError, Result};
use crate::lifecycle::JobStatus;
use crate::qc::thresholds::parse_thresholds;
use crate::store::model::{
    finish_job, row_to_edge, row_to_input, row_to_job, row_to_output, row_to_project,
    row_to_relationship, row_to_sample, App, AppInput, AppOutput, DependencyEdge, Job,
    JobConstraints, Project, QcDelivery, Sample, SampleRelationship,
};
use crate::store::Store;

const JOB_COLUMNS: &str = "id, app_id, project_id, execution_id, status, details, last_updated";

impl Store {
    pub fn project_by_name(&self, name: &str) -> Result<Project> {
        self.conn()
            .query_row(
                "SELECT id, name, output_path, external_id FROM projects WHERE name = ?1",
                params![name],
                row_to_project,
            )
            .optional()?
            .ok_or_else(|| FlowdagError::MissingEntity(format!("missing project: {name}")))
    }

    pub fn project_by_id(&self, id: i64) -> Result<Project> {
        self.conn()
            .query_row(
                "SELECT id, name, output_path, external_id FROM projects WHERE id = ?1",
                params![id],
                row_to_project,
            )
            .optional()?
            .ok_or_else(|| FlowdagError::MissingEntity(format!("missing project: {id}")))
    }

    pub fn sample_by_name(&self, name: &str) -> Result<Sample> {
        self.conn()
            .query_row(
                "SELECT id, name, project_id, created FROM samples WHERE name = ?1",
                params![name],
                row_to_sample,
            )
            .optional()?
            .ok_or_else(|| FlowdagError::MissingEntity(format!("missing sample: {name}")))
    }

    pub fn sample_by_id(&self, id: i64) -> Result<Sample> {
        self.conn()
            .query_row(
                "SELECT id, name, project_id, created FROM samples WHERE id = ?1",
                params![id],
                row_to_sample,
            )
            .optional()?
            .ok_or_else(|| FlowdagError::MissingEntity(format!("missing sample: {id}")))
    }

    pub fn app_by_name(&self, name: &str) -> Result<App> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, name, external_id, contract, defaults FROM apps WHERE name = ?1",
                params![name],
                app_row,
            )
            .optional()?
            .ok_or_else(|| FlowdagError::MissingEntity(format!("missing app: {name}")))?;
        parse_app(row)
    }

    pub fn app_by_id(&self, id: i64) -> Result<App> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, name, external_id, contract, defaults FROM apps WHERE id = ?1",
                params![id],
                app_row,
            )
            .optional()?
            .ok_or_else(|| FlowdagError::MissingEntity(format!("missing app: {id}")))?;
        parse_app(row)
    }

    pub fn apps_by_substring(&self, substring: &str) -> Result<Vec<App>> {
        let like = format!("%{substring}%");
        let mut stmt = self.conn().prepare(
            "SELECT id, name, external_id, contract, defaults FROM apps WHERE name LIKE ?1
             ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![like], app_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(parse_app).collect()
    }

    /// Resolve a unique app from a substring; zero or multiple matches are
    /// errors that name the candidates.
    pub fn one_app_by_substring(&self, substring: &str) -> Result<App> {
        let mut matches = self.apps_by_substring(substring)?;
        match matches.len() {
            0 => Err(FlowdagError::MissingEntity(format!(
                "found no apps matching: {substring}"
            ))),
            1 => Ok(matches.remove(0)),
            _ => {
                let names: Vec<String> = matches.into_iter().map(|a| a.name).collect();
                Err(FlowdagError::FormatError(format!(
                    "found too many apps matching {substring} ({}): be more specific",
                    names.join(", ")
                )))
            }
        }
    }

    pub fn job_by_id(&self, id: i64) -> Result<Job> {
        let pair = self
            .conn()
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                row_to_job,
            )
            .optional()?
            .ok_or_else(|| FlowdagError::MissingEntity(format!("missing job: {id}")))?;
        finish_job(pair)
    }

    /// Jobs matching the given constraints, in id order.
    ///
    /// An explicit id short-circuits everything else, so the single-job CLI
    /// override reaches the same code path as a full pass.
    pub fn jobs_by_constraints(&self, constraints: &JobConstraints) -> Result<Vec<Job>> {
        if let Some(id) = constraints.id {
            return Ok(vec![self.job_by_id(id)?]);
        }

        let mut sql = format!(
            "SELECT DISTINCT jobs.id, jobs.app_id, jobs.project_id, jobs.execution_id,
                    jobs.status, jobs.details, jobs.last_updated
             FROM jobs
             JOIN apps ON apps.id = jobs.app_id
             JOIN projects ON projects.id = jobs.project_id
             LEFT JOIN dependency_edges de ON de.job_id = jobs.id
             LEFT JOIN samples s ON s.id = de.sample_id
             WHERE 1 = 1"
        );
        let mut params_vec: Vec<String> = Vec::new();

        if !constraints.statuses.is_empty() {
            let placeholders: Vec<String> = constraints
                .statuses
                .iter()
                .enumerate()
                .map(|(i, _)| format!("?{}", params_vec.len() + i + 1))
                .collect();
            sql.push_str(&format!(" AND jobs.status IN ({})", placeholders.join(", ")));
            params_vec.extend(constraints.statuses.iter().map(|s| s.as_str().to_string()));
        }
        for (column, value) in [
            ("projects.name", &constraints.project),
            ("s.name", &constraints.sample),
            ("apps.name", &constraints.app),
        ] {
            if let Some(value) = value {
                if constraints.exact {
                    sql.push_str(&format!(" AND {column} = ?{}", params_vec.len() + 1));
                    params_vec.push(value.clone());
                } else {
                    sql.push_str(&format!(" AND {column} LIKE ?{}", params_vec.len() + 1));
                    params_vec.push(format!("%{value}%"));
                }
            }
        }
        sql.push_str(" ORDER BY jobs.id");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params_vec.iter()), row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(finish_job).collect()
    }

    pub fn jobs_with_statuses(&self, statuses: impl IntoIterator<Item = JobStatus>) -> Result<Vec<Job>> {
        self.jobs_by_constraints(&JobConstraints::with_statuses(statuses))
    }

    pub fn count_jobs_with_status(&self, status: JobStatus) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn edges_of(&self, job: &Job) -> Result<Vec<DependencyEdge>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, job_id, parameter, sample_id, upstream_job_id, output_name
             FROM dependency_edges WHERE job_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![job.id], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub(crate) fn edge_by_id(&self, id: i64) -> Result<DependencyEdge> {
        self.conn()
            .query_row(
                "SELECT id, job_id, parameter, sample_id, upstream_job_id, output_name
                 FROM dependency_edges WHERE id = ?1",
                params![id],
                row_to_edge,
            )
            .optional()?
            .ok_or_else(|| FlowdagError::MissingEntity(format!("missing dependency edge: {id}")))
    }

    /// All (upstream job, dependent job) pairs in the store, for acyclicity
    /// checking when new edges are added.
    pub fn job_dependency_pairs(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn().prepare(
            "SELECT upstream_job_id, job_id FROM dependency_edges
             WHERE upstream_job_id IS NOT NULL ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn inputs_of(&self, app: &App) -> Result<Vec<AppInput>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, app_id, name, kind, is_list, description
             FROM app_inputs WHERE app_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![app.id], row_to_input)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn outputs_of(&self, app: &App) -> Result<Vec<AppOutput>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, app_id, name, result_name, kind, path_glob
             FROM app_outputs WHERE app_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![app.id], row_to_output)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn output_by_name(&self, app: &App, name: &str) -> Result<Option<AppOutput>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, app_id, name, result_name, kind, path_glob
                 FROM app_outputs WHERE app_id = ?1 AND name = ?2",
                params![app.id, name],
                row_to_output,
            )
            .optional()?)
    }

    /// The per-app QC descriptor, if one is configured. The threshold blob
    /// is parsed on every load; malformed blobs are format errors.
    pub fn qc_delivery_of(&self, app: &App) -> Result<Option<QcDelivery>> {
        let row = self
            .conn()
            .query_row(
                "SELECT app_id, result_name, metrics_extension, thresholds, deliverables
                 FROM app_qc_delivery WHERE app_id = ?1",
                params![app.id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((app_id, result_name, metrics_extension, thresholds, deliverables)) = row else {
            return Ok(None);
        };
        Ok(Some(QcDelivery {
            app_id,
            result_name,
            metrics_extension,
            thresholds: parse_thresholds(&thresholds)?,
            deliverables: deliverables
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }))
    }

    pub(crate) fn relationship(
        &self,
        from: &Sample,
        to: &Sample,
        kind: &str,
    ) -> Result<SampleRelationship> {
        self.conn()
            .query_row(
                "SELECT id, from_sample, to_sample, kind FROM sample_relationships
                 WHERE from_sample = ?1 AND to_sample = ?2 AND kind = ?3",
                params![from.id, to.id, kind],
                row_to_relationship,
            )
            .optional()?
            .ok_or_else(|| {
                FlowdagError::MissingEntity(format!(
                    "missing sample relationship: {} -> {} ({kind})",
                    from.name, to.name
                ))
            })
    }

    /// The sample that `from` points to through a relationship of `kind`,
    /// e.g. the normal for a tumour.
    pub fn related_sample(&self, from: &Sample, kind: &str) -> Result<Sample> {
        let to_id: Option<i64> = self
            .conn()
            .query_row(
                "SELECT to_sample FROM sample_relationships
                 WHERE from_sample = ?1 AND kind = ?2",
                params![from.id, kind],
                |row| row.get(0),
            )
            .optional()?;
        match to_id {
            Some(id) => self.sample_by_id(id),
            None => Err(FlowdagError::MissingEntity(format!(
                "no {kind} relationship from sample: {}",
                from.name
            ))),
        }
    }

    /// Names of the samples this job directly depends on, in edge order.
    pub fn job_sample_names(&self, job: &Job) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for edge in self.edges_of(job)? {
            if let Some(sample_id) = edge.sample_id {
                names.push(self.sample_by_id(sample_id)?.name);
            }
        }
        Ok(names)
    }

    /// A human-readable name distinguishing this job's result directory:
    /// its sample names plus the flattened app name, falling back to the
    /// job id for jobs with no direct sample dependency.
    pub fn job_distinctive_name(&self, job: &Job) -> Result<String> {
        let app = self.app_by_id(job.app_id)?;
        let samples = self.job_sample_names(job)?;
        if samples.is_empty() {
            return Ok(format!("{}_{}", app.flat_name(), job.id));
        }
        let condensed = if samples.len() < 3 {
            samples.join("+")
        } else {
            format!("{}+ETC", samples[0])
        };
        Ok(format!("{}.{}", condensed, app.flat_name()))
    }

    /// Where this job's deliverables land.
    pub fn job_output_dir(&self, job: &Job) -> Result<PathBuf> {
        let project = self.project_by_id(job.project_id)?;
        Ok(PathBuf::from(project.output_path).join(self.job_distinctive_name(job)?))
    }

    /// One-line description used in agent logs.
    pub fn job_summary(&self, job: &Job) -> Result<String> {
        let app = self.app_by_id(job.app_id)?;
        let project = self.project_by_id(job.project_id)?;
        let samples = self.job_sample_names(job)?.join("+");
        Ok(match &job.execution_id {
            Some(execution_id) => format!(
                "{} :: {} :: {} ({}) (execution: {execution_id}) ({})",
                app.name, project.name, samples, job.id, job.status
            ),
            None => format!(
                "{} :: {} :: {} ({}) ({})",
                app.name, project.name, samples, job.id, job.status
            ),
        })
    }
}

type AppRow = (i64, String, String, String, String);

fn app_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn parse_app(row: AppRow) -> Result<App> {
    let (id, name, external_id, contract, defaults) = row;
    let contract = serde_json::from_str(&contract)
        .map_err(|e| FlowdagError::FormatError(format!("malformed contract for app {name}: {e}")))?;
    let defaults: BTreeMap<String, crate::launch::ParamValue> = serde_json::from_str(&defaults)
        .map_err(|e| FlowdagError::FormatError(format!("malformed defaults for app {name}: {e}")))?;
    Ok(App {
        id,
        name,
        external_id,
        contract,
        defaults,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::ParameterSpec;

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        let project = store.add_project("ProjX", "/data/projx", "77").unwrap();
        let contract = vec![
            ParameterSpec::new("project-id", "project"),
            ParameterSpec::new("sample-id", "sample"),
        ];
        store
            .add_app("Resequencing v2", "901", &contract, &BTreeMap::new(), &BTreeMap::new())
            .unwrap();
        store.add_sample("NA12878", &project).unwrap();
        store
    }

    #[test]
    fn missing_entities_are_errors() {
        let store = seeded();
        assert!(matches!(
            store.project_by_name("nope"),
            Err(FlowdagError::MissingEntity(_))
        ));
        assert!(matches!(
            store.sample_by_name("nope"),
            Err(FlowdagError::MissingEntity(_))
        ));
        assert!(matches!(
            store.app_by_name("nope"),
            Err(FlowdagError::MissingEntity(_))
        ));
    }

    #[test]
    fn substring_app_lookup() {
        let store = seeded();
        assert_eq!(store.one_app_by_substring("Reseq").unwrap().name, "Resequencing v2");

        let contract = vec![ParameterSpec::new("project-id", "project")];
        store
            .add_app("Resequencing v3", "902", &contract, &BTreeMap::new(), &BTreeMap::new())
            .unwrap();
        assert!(matches!(
            store.one_app_by_substring("Reseq"),
            Err(FlowdagError::FormatError(_))
        ));
        assert!(matches!(
            store.one_app_by_substring("zzz"),
            Err(FlowdagError::MissingEntity(_))
        ));
    }

    #[test]
    fn constraint_queries_filter_by_status_and_sample() {
        let store = seeded();
        let project = store.project_by_name("ProjX").unwrap();
        let app = store.app_by_name("Resequencing v2").unwrap();
        let sample = store.sample_by_name("NA12878").unwrap();
        let job = store.add_job(&app, &project).unwrap();
        store
            .add_dependency_edge(&job, "sample-id", Some(&sample), None, None)
            .unwrap();

        let waiting = store.jobs_with_statuses([JobStatus::Waiting]).unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, job.id);

        let by_sample = store
            .jobs_by_constraints(&JobConstraints {
                sample: Some("NA128".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_sample.len(), 1);

        let none = store.jobs_with_statuses([JobStatus::Running]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn distinctive_name_uses_samples_and_flat_app_name() {
        let store = seeded();
        let project = store.project_by_name("ProjX").unwrap();
        let app = store.app_by_name("Resequencing v2").unwrap();
        let sample = store.sample_by_name("NA12878").unwrap();
        let job = store.add_job(&app, &project).unwrap();
        store
            .add_dependency_edge(&job, "sample-id", Some(&sample), None, None)
            .unwrap();

        assert_eq!(
            store.job_distinctive_name(&job).unwrap(),
            "NA12878.Resequencingv2"
        );
        assert_eq!(
            store.job_output_dir(&job).unwrap(),
            PathBuf::from("/data/projx/NA12878.Resequencingv2")
        );
    }
}
