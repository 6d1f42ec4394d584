// src/store/update.rs

//! Status writes. These are conditional: writing the current (status,
//! details) pair again changes nothing, including the last-updated
//! timestamp. That both prevents timestamp churn and guards two overlapping
//! runs of the same agent against double-claiming a job.

use rusqlite::params;

use crate::errors::Result;
use crate::lifecycle::JobStatus;
use crate::store::model::Job;
use crate::store::{now_timestamp, Store};

impl Store {
    /// Record a new status and details for `job`.
    ///
    /// Returns whether anything changed; `false` means the job already had
    /// exactly this status and details.
    pub fn set_job_status(&self, job: &Job, status: JobStatus, details: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE jobs SET status = ?2, details = ?3, last_updated = ?4
             WHERE id = ?1 AND (status <> ?2 OR details <> ?3)",
            params![job.id, status.as_str(), details, now_timestamp()],
        )?;
        Ok(affected > 0)
    }

    /// Record the execution id returned by the remote service at submission.
    pub fn set_execution_id(&self, job: &Job, execution_id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE jobs SET execution_id = ?2 WHERE id = ?1",
            params![job.id, execution_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::launch::ParameterSpec;

    fn store_with_job() -> (Store, Job) {
        let store = Store::open_in_memory().unwrap();
        let project = store.add_project("ProjX", "/data/projx", "77").unwrap();
        let contract = vec![ParameterSpec::new("project-id", "project")];
        let app = store
            .add_app("Resequencing", "901", &contract, &BTreeMap::new(), &BTreeMap::new())
            .unwrap();
        let job = store.add_job(&app, &project).unwrap();
        (store, job)
    }

    #[test]
    fn repeated_identical_write_is_a_noop() {
        let (store, job) = store_with_job();

        let changed = store
            .set_job_status(&job, JobStatus::Submitted, "submission time: t0")
            .unwrap();
        assert!(changed);
        let after_first = store.job_by_id(job.id).unwrap();

        // sleep long enough for a timestamp difference to be representable
        std::thread::sleep(std::time::Duration::from_millis(5));

        let job = store.job_by_id(job.id).unwrap();
        let changed = store
            .set_job_status(&job, JobStatus::Submitted, "submission time: t0")
            .unwrap();
        assert!(!changed);
        let after_second = store.job_by_id(job.id).unwrap();
        assert_eq!(after_first.last_updated, after_second.last_updated);
    }

    #[test]
    fn detail_change_alone_still_writes() {
        let (store, job) = store_with_job();
        store.set_job_status(&job, JobStatus::Waiting, "No data").unwrap();
        let job = store.job_by_id(job.id).unwrap();
        let changed = store
            .set_job_status(&job, JobStatus::Waiting, "yield 10 below minimum 20")
            .unwrap();
        assert!(changed);
        assert_eq!(
            store.job_by_id(job.id).unwrap().details,
            "yield 10 below minimum 20"
        );
    }

    #[test]
    fn execution_id_round_trips() {
        let (store, job) = store_with_job();
        assert!(job.execution_id.is_none());
        store.set_execution_id(&job, "AS-123").unwrap();
        assert_eq!(
            store.job_by_id(job.id).unwrap().execution_id.as_deref(),
            Some("AS-123")
        );
    }
}
