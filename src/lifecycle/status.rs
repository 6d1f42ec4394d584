// src/lifecycle/status.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::FlowdagError;

/// The closed set of job statuses.
///
/// Each status is claimed by exactly one agent's read filter:
/// - `waiting` by the submit agent
/// - `submitted`/`pending`/`running` by the track agent
/// - `app-finished` by the QC agent
/// - `qc-passed` by the download agent
///
/// The remaining states are terminal, or owned by the external download
/// worker process (`downloading` → `downloaded`/`download-failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum JobStatus {
    Waiting,
    Submitted,
    Pending,
    Running,
    LaunchFailed,
    RunFailed,
    AppFinished,
    QcFailed,
    QcPassed,
    Downloading,
    DownloadFailed,
    Downloaded,
}

impl JobStatus {
    /// Canonical string form, as stored in the entity store.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Submitted => "submitted",
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::LaunchFailed => "launch-failed",
            JobStatus::RunFailed => "run-failed",
            JobStatus::AppFinished => "app-finished",
            JobStatus::QcFailed => "qc-failed",
            JobStatus::QcPassed => "qc-passed",
            JobStatus::Downloading => "downloading",
            JobStatus::DownloadFailed => "download-failed",
            JobStatus::Downloaded => "downloaded",
        }
    }

    /// The status a freshly created job starts in.
    pub fn default_status() -> Self {
        JobStatus::Waiting
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = FlowdagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobStatus::Waiting),
            "submitted" => Ok(JobStatus::Submitted),
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "launch-failed" => Ok(JobStatus::LaunchFailed),
            "run-failed" => Ok(JobStatus::RunFailed),
            "app-finished" => Ok(JobStatus::AppFinished),
            "qc-failed" => Ok(JobStatus::QcFailed),
            "qc-passed" => Ok(JobStatus::QcPassed),
            "downloading" => Ok(JobStatus::Downloading),
            "download-failed" => Ok(JobStatus::DownloadFailed),
            "downloaded" => Ok(JobStatus::Downloaded),
            other => Err(FlowdagError::UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = FlowdagError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
