// src/config/mod.rs

//! Persisted configuration consumed by the agents.
//!
//! - [`model`] maps the TOML file structure.
//! - [`loader`] reads and deserialises it.
//! - [`validate`] turns the raw file into a validated [`ConfigFile`],
//!   rejecting bad limits and unmapped status names up front.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, DownloadSection, LimitsSection, RawConfigFile, ServiceSection, StoreSection,
};
