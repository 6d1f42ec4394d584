// src/lifecycle/summary.rs

//! End-of-pass transition reporting.

use std::collections::BTreeMap;

use tracing::info;

use crate::lifecycle::JobStatus;

/// Above this many jobs per (old, new) pair, only the count is logged.
const ID_LIST_THRESHOLD: usize = 40;

/// Records the status transitions one agent pass has made, so the pass can
/// log a compact per-transition summary at the end.
#[derive(Debug, Default)]
pub struct TransitionLog {
    transitions: BTreeMap<(JobStatus, JobStatus), Vec<i64>>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, job_id: i64, old: JobStatus, new: JobStatus) {
        self.transitions.entry((old, new)).or_default().push(job_id);
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Total number of recorded transitions.
    pub fn len(&self) -> usize {
        self.transitions.values().map(Vec::len).sum()
    }

    pub fn count(&self, old: JobStatus, new: JobStatus) -> usize {
        self.transitions
            .get(&(old, new))
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Log one line per (old, new) pair. Job id lists are only included when
    /// the count stays readable.
    pub fn report(&self) {
        for ((old, new), ids) in &self.transitions {
            if ids.len() > ID_LIST_THRESHOLD {
                info!(
                    transition = %format!("{old} -> {new}"),
                    count = ids.len(),
                    "pass transitions"
                );
            } else {
                let id_list = ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                info!(
                    transition = %format!("{old} -> {new}"),
                    count = ids.len(),
                    jobs = %id_list,
                    "pass transitions"
                );
            }
        }
    }
}
