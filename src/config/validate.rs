// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{FlowdagError, Result};
use crate::lifecycle::JobStatus;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FlowdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let mapping = parse_status_mapping(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, mapping))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.limits.max_concurrent_downloads == 0 {
        return Err(FlowdagError::ConfigError(
            "[limits].max_concurrent_downloads must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.limits.minimum_yield < 0.0 {
        return Err(FlowdagError::ConfigError(format!(
            "[limits].minimum_yield must not be negative (got {})",
            cfg.limits.minimum_yield
        )));
    }

    if cfg.service.api_version.trim().is_empty() {
        return Err(FlowdagError::ConfigError(
            "[service].api_version must not be empty".to_string(),
        ));
    }

    if cfg.service.vendor_cli.is_empty() {
        return Err(FlowdagError::ConfigError(
            "[service].vendor_cli must name a command".to_string(),
        ));
    }

    if cfg.download.worker.is_empty() {
        return Err(FlowdagError::ConfigError(
            "[download].worker must name a command".to_string(),
        ));
    }

    if cfg.status_mapping.is_empty() {
        return Err(FlowdagError::ConfigError(
            "[status_mapping] must contain at least one entry".to_string(),
        ));
    }

    Ok(())
}

/// Parse every mapping value into a [`JobStatus`] so that a typo in the
/// config fails the load instead of a later tracker pass.
fn parse_status_mapping(cfg: &RawConfigFile) -> Result<BTreeMap<String, JobStatus>> {
    let mut mapping = BTreeMap::new();
    for (vendor, local) in &cfg.status_mapping {
        let status: JobStatus = local.parse().map_err(|_| {
            FlowdagError::ConfigError(format!(
                "[status_mapping].{vendor} maps to unknown status '{local}'"
            ))
        })?;
        mapping.insert(vendor.clone(), status);
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(
            cfg.status_mapping.get("Complete"),
            Some(&JobStatus::AppFinished)
        );
        assert_eq!(cfg.limits.max_concurrent_downloads, 5);
    }

    #[test]
    fn rejects_zero_download_cap() {
        let mut raw = RawConfigFile::default();
        raw.limits.max_concurrent_downloads = 0;
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn rejects_unknown_mapping_target() {
        let mut raw = RawConfigFile::default();
        raw.status_mapping
            .insert("TimedOut".to_string(), "exploded".to_string());
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("TimedOut"));
    }

    #[test]
    fn parses_toml_sections() {
        let raw: RawConfigFile = toml::from_str(
            r#"
            [limits]
            minimum_yield = 1000.0
            max_concurrent_downloads = 2

            [status_mapping]
            Complete = "app-finished"
            Aborted = "run-failed"
            "#,
        )
        .unwrap();
        let cfg = ConfigFile::try_from(raw).unwrap();
        assert_eq!(cfg.limits.minimum_yield, 1000.0);
        assert_eq!(cfg.status_mapping.len(), 2);
        // untouched sections keep their defaults
        assert_eq!(cfg.service.api_version, "v1pre3");
    }
}
