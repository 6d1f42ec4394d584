// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed stored data: bad threshold blob, bad contract blob,
    /// an edge with both or neither target, a bad glob.
    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Missing entity: {0}")]
    MissingEntity(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Launch payload could not be built from the resolved values.
    #[error("Launch specification error: {0}")]
    Specification(String),

    /// QC could not be applied at all (missing metrics file, metric absent
    /// from results). Distinct from a QC *failure*, which is a normal result.
    #[error("QC error: {0}")]
    Qc(String),

    /// A vendor status string with no entry in the status mapping table.
    #[error("Unknown remote status: {0}")]
    UnknownStatus(String),

    /// A call to the remote execution service failed.
    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("Cycle detected in job dependencies: {0}")]
    DependencyCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    SqlError(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowdagError>;
