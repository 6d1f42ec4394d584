// src/launch/contract.rs

use serde::{Deserialize, Serialize};

/// Parameter that every app receives from the owning project rather than
/// from a dependency edge.
pub const PROJECT_PARAMETER: &str = "project-id";

/// One named, typed parameter of an app's contract.
///
/// The type string is the vendor's: a bare kind such as `"string"` or
/// `"sample"`, with a `[]` suffix for list parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub ty: String,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }

    /// Whether this parameter takes a list of values.
    pub fn is_list(&self) -> bool {
        self.ty.contains("[]")
    }

    /// The type with any list specifier stripped.
    pub fn bald_type(&self) -> String {
        self.ty.replace(['[', ']'], "")
    }
}

/// A value supplied for a parameter: either a single string or a list.
///
/// Scalars supplied for list-typed parameters are split on commas during
/// resolution, so `"a,b"` and `["a", "b"]` resolve identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl ParamValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        ParamValue::Scalar(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}
