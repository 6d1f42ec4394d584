#![allow(dead_code)]

use std::collections::BTreeMap;

use flowdag::config::{ConfigFile, RawConfigFile};
use flowdag::launch::{ParamValue, ParameterSpec};
use flowdag::store::{App, Project, Store};

/// Validated config with the stock defaults; tweak the raw file first when a
/// test needs different limits.
pub fn test_config() -> ConfigFile {
    ConfigFile::try_from(RawConfigFile::default()).expect("default config must validate")
}

/// Config with custom limits, the common case for dispatch tests.
pub fn test_config_with_limits(minimum_yield: f64, max_concurrent_downloads: usize) -> ConfigFile {
    let mut raw = RawConfigFile::default();
    raw.limits.minimum_yield = minimum_yield;
    raw.limits.max_concurrent_downloads = max_concurrent_downloads;
    ConfigFile::try_from(raw).expect("config must validate")
}

/// Builder for registering an app with contract, defaults, outputs and an
/// optional QC-and-delivery descriptor.
pub struct AppBuilder {
    name: String,
    external_id: String,
    contract: Vec<ParameterSpec>,
    defaults: BTreeMap<String, ParamValue>,
    descriptions: BTreeMap<String, String>,
    outputs: Vec<(String, String, String, String)>,
    qc: Option<(Option<String>, String, String, Vec<String>)>,
}

impl AppBuilder {
    pub fn new(name: &str, external_id: &str) -> Self {
        Self {
            name: name.to_string(),
            external_id: external_id.to_string(),
            contract: Vec::new(),
            defaults: BTreeMap::new(),
            descriptions: BTreeMap::new(),
            outputs: Vec::new(),
            qc: None,
        }
    }

    pub fn param(mut self, name: &str, ty: &str) -> Self {
        self.contract.push(ParameterSpec::new(name, ty));
        self
    }

    pub fn default_value(mut self, name: &str, value: ParamValue) -> Self {
        self.defaults.insert(name.to_string(), value);
        self
    }

    pub fn description(mut self, name: &str, description: &str) -> Self {
        self.descriptions
            .insert(name.to_string(), description.to_string());
        self
    }

    pub fn output(mut self, name: &str, result_name: &str, kind: &str, path_glob: &str) -> Self {
        self.outputs.push((
            name.to_string(),
            result_name.to_string(),
            kind.to_string(),
            path_glob.to_string(),
        ));
        self
    }

    pub fn qc(
        mut self,
        result_name: Option<&str>,
        metrics_extension: &str,
        thresholds_json: &str,
        deliverables: &[&str],
    ) -> Self {
        self.qc = Some((
            result_name.map(str::to_string),
            metrics_extension.to_string(),
            thresholds_json.to_string(),
            deliverables.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn register(self, store: &Store) -> App {
        let app = store
            .add_app(
                &self.name,
                &self.external_id,
                &self.contract,
                &self.defaults,
                &self.descriptions,
            )
            .expect("app registration failed");
        for (name, result_name, kind, path_glob) in &self.outputs {
            store
                .add_app_output(&app, name, result_name, kind, path_glob)
                .expect("output registration failed");
        }
        if let Some((result_name, extension, thresholds, deliverables)) = &self.qc {
            store
                .add_qc_delivery(
                    &app,
                    result_name.as_deref(),
                    extension,
                    thresholds,
                    deliverables,
                )
                .expect("QC registration failed");
        }
        app
    }
}

/// A project whose output path lives in a caller-owned directory.
pub fn seed_project(store: &Store, name: &str, external_id: &str, output_path: &str) -> Project {
    store
        .add_project(name, output_path, external_id)
        .expect("project creation failed")
}
