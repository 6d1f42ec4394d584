// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::lifecycle::JobStatus;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [service]
/// api_version = "v1pre3"
/// qc_namespace = "AutomatedQC"
///
/// [limits]
/// minimum_yield = 105000000000.0
/// max_concurrent_downloads = 5
///
/// [status_mapping]
/// Complete = "app-finished"
/// Running = "running"
/// ```
///
/// All sections are optional and have defaults matching a stock deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Remote service details from `[service]`.
    #[serde(default)]
    pub service: ServiceSection,

    /// Entity store location from `[store]`.
    #[serde(default)]
    pub store: StoreSection,

    /// Numeric gates from `[limits]`.
    #[serde(default)]
    pub limits: LimitsSection,

    /// Vendor status string → local status string, from `[status_mapping]`.
    ///
    /// Values are validated against the permitted status set when the raw
    /// file is converted into a [`ConfigFile`].
    #[serde(default = "default_status_mapping")]
    pub status_mapping: BTreeMap<String, String>,

    /// Download worker details from `[download]`.
    #[serde(default)]
    pub download: DownloadSection,
}

/// `[service]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    /// API version prefix used in entity reference strings,
    /// e.g. `"v1pre3"` in `"v1pre3/samples/123"`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Parameter types that are rewritten into entity reference strings.
    #[serde(default = "default_entity_kinds")]
    pub entity_kinds: Vec<String>,

    /// Metadata namespace under which QC verdicts are published.
    #[serde(default = "default_qc_namespace")]
    pub qc_namespace: String,

    /// Command prefix for the vendor's own command-line client, which the
    /// production [`RemoteService`](crate::remote::RemoteService)
    /// implementation shells out to.
    #[serde(default = "default_vendor_cli")]
    pub vendor_cli: Vec<String>,
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Path to the SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: String,
}

/// `[limits]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    /// Minimum sequencing yield (bases) a sample must reach before a job
    /// depending on it is considered ready.
    ///
    /// The stock value is 105 gigabases, sized for a 30x genome.
    #[serde(default = "default_minimum_yield")]
    pub minimum_yield: f64,

    /// Cap on concurrently running download worker processes.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
}

/// `[download]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSection {
    /// Command prefix for the per-job download worker; the job id is
    /// appended as `--id <N>`.
    #[serde(default = "default_download_worker")]
    pub worker: Vec<String>,

    /// Name of the per-job subdirectory that download and QC logs
    /// (and fetched metrics files) are written into.
    #[serde(default = "default_log_dir_name")]
    pub log_dir_name: String,
}

fn default_api_version() -> String {
    "v1pre3".to_string()
}

fn default_entity_kinds() -> Vec<String> {
    ["sample", "project", "appresult", "file"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_qc_namespace() -> String {
    "AutomatedQC".to_string()
}

fn default_vendor_cli() -> Vec<String> {
    vec!["bs".to_string()]
}

fn default_store_path() -> String {
    "data/flowdag.sqlite".to_string()
}

fn default_minimum_yield() -> f64 {
    105_000_000_000.0
}

fn default_max_concurrent_downloads() -> usize {
    5
}

fn default_download_worker() -> Vec<String> {
    vec!["flowdag".to_string(), "download-worker".to_string()]
}

fn default_log_dir_name() -> String {
    "log".to_string()
}

/// The vendor statuses observed in practice differ from the ones the vendor
/// documents, so the stock mapping is kept editable in config.
fn default_status_mapping() -> BTreeMap<String, String> {
    [
        ("Complete", "app-finished"),
        ("Running", "running"),
        ("PendingExecution", "pending"),
        ("Initializing", "pending"),
        ("Aborted", "run-failed"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            entity_kinds: default_entity_kinds(),
            qc_namespace: default_qc_namespace(),
            vendor_cli: default_vendor_cli(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            minimum_yield: default_minimum_yield(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
        }
    }
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            worker: default_download_worker(),
            log_dir_name: default_log_dir_name(),
        }
    }
}

impl Default for RawConfigFile {
    fn default() -> Self {
        Self {
            service: ServiceSection::default(),
            store: StoreSection::default(),
            limits: LimitsSection::default(),
            status_mapping: default_status_mapping(),
            download: DownloadSection::default(),
        }
    }
}

/// Validated configuration.
///
/// Construct via `ConfigFile::try_from(raw)`; see `config::validate`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub service: ServiceSection,
    pub store: StoreSection,
    pub limits: LimitsSection,
    /// Vendor status string → local status, with every value parsed.
    pub status_mapping: BTreeMap<String, JobStatus>,
    pub download: DownloadSection,
}

impl ConfigFile {
    /// Build a `ConfigFile` without re-running validation.
    ///
    /// Only `config::validate` should call this, after the checks have
    /// passed.
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        status_mapping: BTreeMap<String, JobStatus>,
    ) -> Self {
        Self {
            service: raw.service,
            store: raw.store,
            limits: raw.limits,
            status_mapping,
            download: raw.download,
        }
    }
}
