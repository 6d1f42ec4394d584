// src/remote/mod.rs

//! The remote execution service, as the abstract interface the agents
//! consume.
//!
//! Production code uses [`vendor::VendorCli`], a thin adapter around the
//! vendor's own command-line client; tests provide their own implementation
//! that doesn't shell out (see `flowdag-test-utils`). The wire protocol,
//! authentication and file transfer all live on the far side of this trait.

pub mod vendor;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::Deserialize;

use crate::errors::{FlowdagError, Result};
use crate::launch::LaunchPayload;
use crate::lifecycle::JobStatus;

pub use vendor::VendorCli;

/// Boxed future alias used by the trait methods, so the trait stays object
/// safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// One raw-data bundle the remote service holds for a sample. A sample can
/// have several bundles; implementations return them most recent first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SampleBundle {
    #[serde(rename = "Id")]
    pub external_id: String,
    #[serde(rename = "NumReadsPF")]
    pub reads: u64,
    #[serde(rename = "Read1")]
    pub read1_length: u32,
    #[serde(rename = "Read2", default)]
    pub read2_length: u32,
    #[serde(rename = "IsPairedEnd")]
    pub paired_end: bool,
}

impl SampleBundle {
    /// Sequencing data volume in bases: read count × read length, doubled
    /// for paired-end runs.
    pub fn yield_bases(&self) -> Result<f64> {
        if self.paired_end && self.read1_length != self.read2_length {
            return Err(FlowdagError::FormatError(format!(
                "cannot measure yield on bundle {} with unequal read lengths ({} vs {})",
                self.external_id, self.read1_length, self.read2_length
            )));
        }
        let factor = if self.paired_end { 2.0 } else { 1.0 };
        Ok(self.reads as f64 * factor * self.read1_length as f64)
    }
}

/// Operations the orchestrator needs from the remote execution service.
pub trait RemoteService: Send + Sync {
    /// Submit a job; returns the remote execution identifier.
    fn submit<'a>(
        &'a self,
        app_external_id: &'a str,
        payload: &'a LaunchPayload,
    ) -> BoxFuture<'a, String>;

    /// Vendor status string for a submitted execution. Map through
    /// [`map_vendor_status`] before acting on it.
    fn status<'a>(&'a self, execution_id: &'a str) -> BoxFuture<'a, String>;

    /// Raw-data bundles for a sample within a project, most recent first.
    fn sample_bundles<'a>(
        &'a self,
        project_external_id: &'a str,
        sample_name: &'a str,
    ) -> BoxFuture<'a, Vec<SampleBundle>>;

    /// Remote entity ids of an execution's output: the file ids matching
    /// `path_glob` within the named result, or the result itself when no
    /// glob is given.
    fn locate_output<'a>(
        &'a self,
        execution_id: &'a str,
        result_name: Option<&'a str>,
        path_glob: Option<&'a str>,
    ) -> BoxFuture<'a, Vec<String>>;

    /// Download the result files matching `extension` into `dest`; returns
    /// the local paths written.
    fn download_files<'a>(
        &'a self,
        execution_id: &'a str,
        extension: &'a str,
        dest: &'a Path,
        result_name: Option<&'a str>,
    ) -> BoxFuture<'a, Vec<PathBuf>>;

    /// Publish key/value metadata (e.g. the QC verdict) on an execution
    /// under a namespace.
    fn set_metadata<'a>(
        &'a self,
        execution_id: &'a str,
        namespace: &'a str,
        values: &'a [(String, String)],
    ) -> BoxFuture<'a, ()>;
}

/// Map a vendor status string to a local status via the configured table.
///
/// A vendor status with no mapping entry is a hard error: better to fail the
/// single tracking operation than to guess at lifecycle semantics.
pub fn map_vendor_status(
    mapping: &BTreeMap<String, JobStatus>,
    vendor_status: &str,
) -> Result<JobStatus> {
    mapping
        .get(vendor_status)
        .copied()
        .ok_or_else(|| FlowdagError::UnknownStatus(vendor_status.to_string()))
}
