// src/qc/thresholds.rs

//! Threshold definitions and comparison.
//!
//! Operator names are a closed set, resolved when the threshold blob is
//! loaded so that a malformed name fails the load rather than a later
//! comparison.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{FlowdagError, Result};

/// The standard comparison operators permitted in threshold maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
        }
    }

    pub fn apply(&self, observed: f64, threshold: f64) -> bool {
        match self {
            CompareOp::Eq => observed == threshold,
            CompareOp::Ne => observed != threshold,
            CompareOp::Lt => observed < threshold,
            CompareOp::Le => observed <= threshold,
            CompareOp::Gt => observed > threshold,
            CompareOp::Ge => observed >= threshold,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One threshold entry: `{"operator": "ge", "threshold": 300}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Threshold {
    pub operator: CompareOp,
    pub threshold: f64,
}

/// Metric name → threshold, as stored per app.
pub type ThresholdMap = BTreeMap<String, Threshold>;

/// Parse a stored threshold blob, validating every operator name.
pub fn parse_thresholds(blob: &str) -> Result<ThresholdMap> {
    serde_json::from_str(blob)
        .map_err(|e| FlowdagError::FormatError(format!("malformed threshold blob: {e}")))
}

/// Check one observed metric value against its threshold.
///
/// Returns `None` when the metric passes, otherwise a human-readable failure
/// description naming metric, observed value, operator and threshold. Values
/// that cannot be compared numerically (e.g. "NA") also count as failures,
/// with the parse problem appended.
pub fn check_metric(name: &str, observed: &Value, threshold: &Threshold) -> Option<String> {
    match numeric(observed) {
        Some(value) => {
            if threshold.operator.apply(value, threshold.threshold) {
                None
            } else {
                Some(format!(
                    "{name} ({observed} {} {})",
                    threshold.operator, threshold.threshold
                ))
            }
        }
        None => Some(format!(
            "{name} ({observed} {} {}) (not a number)",
            threshold.operator, threshold.threshold
        )),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_operator_names_at_load_time() {
        let map = parse_thresholds(r#"{"insert_size": {"operator": "ge", "threshold": 300}}"#)
            .unwrap();
        assert_eq!(map["insert_size"].operator, CompareOp::Ge);
        assert_eq!(map["insert_size"].threshold, 300.0);
    }

    #[test]
    fn rejects_unknown_operator_at_load_time() {
        let err =
            parse_thresholds(r#"{"insert_size": {"operator": "above", "threshold": 300}}"#)
                .unwrap_err();
        assert!(err.to_string().contains("malformed threshold blob"));
    }

    #[test]
    fn value_meeting_threshold_passes() {
        let t = Threshold {
            operator: CompareOp::Ge,
            threshold: 300.0,
        };
        assert_eq!(check_metric("insert_size", &json!(310), &t), None);
    }

    #[test]
    fn value_below_threshold_fails_with_description() {
        let t = Threshold {
            operator: CompareOp::Ge,
            threshold: 300.0,
        };
        let failure = check_metric("insert_size", &json!(290), &t).unwrap();
        assert_eq!(failure, "insert_size (290 ge 300)");
    }

    #[test]
    fn non_numeric_value_fails_rather_than_errors() {
        let t = Threshold {
            operator: CompareOp::Gt,
            threshold: 1.0,
        };
        let failure = check_metric("dup_rate", &json!("NA"), &t).unwrap();
        assert!(failure.contains("not a number"));
    }

    #[test]
    fn percent_strings_compare_numerically() {
        let t = Threshold {
            operator: CompareOp::Ge,
            threshold: 95.0,
        };
        assert_eq!(check_metric("q30", &json!("97.3%"), &t), None);
    }
}
