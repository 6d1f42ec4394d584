// src/launch/spec.rs

//! Turning a parameter contract plus resolved values into a submission
//! payload.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;

use crate::config::ServiceSection;
use crate::errors::{FlowdagError, Result};
use crate::launch::contract::{ParamValue, ParameterSpec};

/// Resolves launch payloads for one app's contract.
///
/// Holds borrowed views of the contract and defaults (both owned by the app
/// record) plus the entity-reference configuration.
#[derive(Debug)]
pub struct LaunchSpecification<'a> {
    contract: &'a [ParameterSpec],
    defaults: &'a BTreeMap<String, ParamValue>,
    entity_kinds: &'a [String],
    api_version: &'a str,
}

/// One fully resolved parameter in the submission payload.
///
/// Scalar parameters carry `Content`, list parameters carry `Items`,
/// matching the shape the remote service accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParameter {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Content", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "Items", skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
}

/// The structured submission payload.
///
/// Built deterministically (parameters in contract order), so resolving the
/// same inputs twice yields byte-identical JSON, and `simulate` agrees
/// exactly with `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchPayload {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "StatusSummary")]
    pub status_summary: String,
    #[serde(rename = "AutoStart")]
    pub auto_start: bool,
    #[serde(rename = "Properties")]
    pub properties: Vec<ResolvedParameter>,
}

impl LaunchPayload {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<'a> LaunchSpecification<'a> {
    pub fn new(
        contract: &'a [ParameterSpec],
        defaults: &'a BTreeMap<String, ParamValue>,
        service: &'a ServiceSection,
    ) -> Self {
        Self {
            contract,
            defaults,
            entity_kinds: &service.entity_kinds,
            api_version: &service.api_version,
        }
    }

    /// All parameter names the contract declares.
    pub fn variable_requirements(&self) -> BTreeSet<&str> {
        self.contract.iter().map(|p| p.name.as_str()).collect()
    }

    /// Contract parameters with no configured default; these must be
    /// satisfied by dependency values.
    pub fn minimum_requirements(&self) -> BTreeSet<&str> {
        self.variable_requirements()
            .into_iter()
            .filter(|name| !self.defaults.contains_key(*name))
            .collect()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.contract.iter().find(|p| p.name == name)
    }

    /// Whether the named contract parameter is list-typed.
    pub fn is_list(&self, name: &str) -> Result<bool> {
        self.parameter(name)
            .map(ParameterSpec::is_list)
            .ok_or_else(|| {
                FlowdagError::Specification(format!("asking for type of unknown parameter: {name}"))
            })
    }

    /// Build the submission payload for `supplied` values under `label`.
    pub fn resolve(
        &self,
        supplied: &BTreeMap<String, ParamValue>,
        label: &str,
    ) -> Result<LaunchPayload> {
        let required = self.minimum_requirements();
        let supplied_names: BTreeSet<&str> = supplied.keys().map(String::as_str).collect();

        let missing: Vec<&str> = required.difference(&supplied_names).copied().collect();
        if !missing.is_empty() {
            return Err(FlowdagError::Specification(format!(
                "compulsory parameter(s) missing: {}",
                missing.join(", ")
            )));
        }

        let known = self.variable_requirements();
        let unused: Vec<&str> = supplied_names.difference(&known).copied().collect();
        if !unused.is_empty() {
            warn!(parameters = %unused.join(", "), "unused parameter(s) supplied");
        }

        // Defaults first, supplied values win.
        let mut merged: BTreeMap<String, ParamValue> = self.defaults.clone();
        for (name, value) in supplied {
            merged.insert(name.clone(), value.clone());
        }

        let properties = self
            .contract
            .iter()
            .map(|param| self.populate_parameter(param, &merged))
            .collect::<Result<Vec<_>>>()?;

        Ok(LaunchPayload {
            name: label.to_string(),
            status_summary: "AutoLaunch".to_string(),
            auto_start: true,
            properties,
        })
    }

    fn populate_parameter(
        &self,
        param: &ParameterSpec,
        merged: &BTreeMap<String, ParamValue>,
    ) -> Result<ResolvedParameter> {
        let value = merged.get(&param.name).ok_or_else(|| {
            FlowdagError::Specification(format!("no value resolved for parameter: {}", param.name))
        })?;

        let bald = param.bald_type();
        let is_entity = self.entity_kinds.iter().any(|kind| *kind == bald);

        if param.is_list() {
            let items = match value {
                // comma-separated scalars become lists
                ParamValue::Scalar(s) => s.split(',').map(str::to_string).collect(),
                ParamValue::List(items) => items.clone(),
            };
            let items = if is_entity {
                items
                    .iter()
                    .map(|id| self.entity_reference(&bald, id))
                    .collect()
            } else {
                items
            };
            Ok(ResolvedParameter {
                name: param.name.clone(),
                ty: param.ty.clone(),
                content: None,
                items: Some(items),
            })
        } else {
            let content = match value {
                ParamValue::Scalar(s) => s.clone(),
                ParamValue::List(_) => {
                    return Err(FlowdagError::Specification(format!(
                        "list value supplied for scalar parameter: {}",
                        param.name
                    )));
                }
            };
            let content = if is_entity {
                self.entity_reference(&bald, &content)
            } else {
                content
            };
            Ok(ResolvedParameter {
                name: param.name.clone(),
                ty: param.ty.clone(),
                content: Some(content),
                items: None,
            })
        }
    }

    /// Canonical `api-version/entity-kind-plural/id` reference string.
    fn entity_reference(&self, kind: &str, id: &str) -> String {
        format!("{}/{}s/{}", self.api_version, kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ServiceSection {
        ServiceSection::default()
    }

    fn contract() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("project-id", "project"),
            ParameterSpec::new("sample-id", "sample"),
            ParameterSpec::new("extra-flags", "string[]"),
        ]
    }

    fn defaults() -> BTreeMap<String, ParamValue> {
        [("extra-flags".to_string(), ParamValue::list(["--fast"]))]
            .into_iter()
            .collect()
    }

    #[test]
    fn minimum_requirements_exclude_defaults() {
        let contract = contract();
        let defaults = defaults();
        let service = service();
        let spec = LaunchSpecification::new(&contract, &defaults, &service);
        let required = spec.minimum_requirements();
        assert!(required.contains("project-id"));
        assert!(required.contains("sample-id"));
        assert!(!required.contains("extra-flags"));
    }

    #[test]
    fn missing_required_parameter_fails() {
        let contract = contract();
        let defaults = defaults();
        let service = service();
        let spec = LaunchSpecification::new(&contract, &defaults, &service);

        let supplied: BTreeMap<String, ParamValue> =
            [("project-id".to_string(), ParamValue::scalar("77"))]
                .into_iter()
                .collect();
        let err = spec.resolve(&supplied, "label").unwrap_err();
        assert!(err.to_string().contains("sample-id"), "{err}");
    }

    #[test]
    fn entity_references_are_rewritten() {
        let contract = contract();
        let defaults = defaults();
        let service = service();
        let spec = LaunchSpecification::new(&contract, &defaults, &service);

        let supplied: BTreeMap<String, ParamValue> = [
            ("project-id".to_string(), ParamValue::scalar("77")),
            ("sample-id".to_string(), ParamValue::scalar("1234")),
        ]
        .into_iter()
        .collect();
        let payload = spec.resolve(&supplied, "NA12878 : Resequencing").unwrap();

        assert_eq!(payload.name, "NA12878 : Resequencing");
        assert!(payload.auto_start);
        let by_name: BTreeMap<&str, &ResolvedParameter> = payload
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();
        assert_eq!(
            by_name["project-id"].content.as_deref(),
            Some("v1pre3/projects/77")
        );
        assert_eq!(
            by_name["sample-id"].content.as_deref(),
            Some("v1pre3/samples/1234")
        );
        // non-entity default untouched
        assert_eq!(
            by_name["extra-flags"].items.as_deref(),
            Some(["--fast".to_string()].as_slice())
        );
    }

    #[test]
    fn comma_scalar_and_presplit_list_resolve_identically() {
        let contract = vec![
            ParameterSpec::new("project-id", "project"),
            ParameterSpec::new("sample-id", "sample[]"),
        ];
        let defaults = BTreeMap::new();
        let service = service();
        let spec = LaunchSpecification::new(&contract, &defaults, &service);

        let as_string: BTreeMap<String, ParamValue> = [
            ("project-id".to_string(), ParamValue::scalar("77")),
            ("sample-id".to_string(), ParamValue::scalar("1,2")),
        ]
        .into_iter()
        .collect();
        let as_list: BTreeMap<String, ParamValue> = [
            ("project-id".to_string(), ParamValue::scalar("77")),
            ("sample-id".to_string(), ParamValue::list(["1", "2"])),
        ]
        .into_iter()
        .collect();

        let a = spec.resolve(&as_string, "x").unwrap();
        let b = spec.resolve(&as_list, "x").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn resolve_is_deterministic() {
        let contract = contract();
        let defaults = defaults();
        let service = service();
        let spec = LaunchSpecification::new(&contract, &defaults, &service);

        let supplied: BTreeMap<String, ParamValue> = [
            ("project-id".to_string(), ParamValue::scalar("77")),
            ("sample-id".to_string(), ParamValue::scalar("1234")),
        ]
        .into_iter()
        .collect();
        let first = spec.resolve(&supplied, "x").unwrap().to_json().unwrap();
        let second = spec.resolve(&supplied, "x").unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_supplied_parameter_is_not_fatal() {
        let contract = contract();
        let defaults = defaults();
        let service = service();
        let spec = LaunchSpecification::new(&contract, &defaults, &service);

        let supplied: BTreeMap<String, ParamValue> = [
            ("project-id".to_string(), ParamValue::scalar("77")),
            ("sample-id".to_string(), ParamValue::scalar("1234")),
            ("mystery".to_string(), ParamValue::scalar("?")),
        ]
        .into_iter()
        .collect();
        let payload = spec.resolve(&supplied, "x").unwrap();
        assert!(payload.properties.iter().all(|p| p.name != "mystery"));
    }
}
