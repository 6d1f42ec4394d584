// src/qc/metrics.rs

//! Flat-key metric extraction from the two metrics file formats apps
//! produce, selected by file extension.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::errors::{FlowdagError, Result};

/// Parsed metrics: flat key → value.
pub type MetricMap = BTreeMap<String, Value>;

/// Parse a metrics file into a flat key → value map.
///
/// - `.csv`: each row is a key/value pair; rows with a different width or a
///   non-numeric value are skipped. Keys lose any trailing colon, values any
///   percent sign.
/// - `.json`: each top-level entry is a table with a column header list
///   (`header` or `tableColumns`) and `rows`; cells are flattened into
///   `section.column.rowlabel` keys.
pub fn parse_metrics(path: &Path) -> Result<MetricMap> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => parse_key_value_csv(path),
        Some("json") => parse_nested_tables(path),
        _ => Err(FlowdagError::Qc(format!(
            "unknown extension on QC file: {}",
            path.display()
        ))),
    }
}

fn parse_key_value_csv(path: &Path) -> Result<MetricMap> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| FlowdagError::Qc(format!("reading {}: {e}", path.display())))?;

    let mut values = MetricMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| FlowdagError::Qc(format!("reading {}: {e}", path.display())))?;
        if record.len() != 2 {
            continue;
        }
        let key = record[0].trim().trim_matches(':').to_string();
        let Ok(value) = record[1].trim().trim_end_matches('%').parse::<f64>() else {
            continue;
        };
        values.insert(key, Value::from(value));
    }
    Ok(values)
}

fn parse_nested_tables(path: &Path) -> Result<MetricMap> {
    let contents = std::fs::read_to_string(path)?;
    let doc: Value = serde_json::from_str(&contents)
        .map_err(|e| FlowdagError::Qc(format!("parsing {}: {e}", path.display())))?;
    let Some(sections) = doc.as_object() else {
        return Err(FlowdagError::Qc(format!(
            "expected a top-level object in {}",
            path.display()
        )));
    };

    let mut values = MetricMap::new();
    for (section, details) in sections {
        let headers = details
            .get("header")
            .or_else(|| details.get("tableColumns"))
            .and_then(Value::as_array);
        let Some(headers) = headers else {
            // not a table section
            continue;
        };
        let rows = details.get("rows").and_then(Value::as_array).ok_or_else(|| {
            FlowdagError::Qc(format!("expected to find rows in section {section}"))
        })?;
        for row in rows {
            let Some(cells) = row.as_array() else {
                continue;
            };
            let Some(row_label) = cells.first().and_then(Value::as_str) else {
                continue;
            };
            for (index, header) in headers.iter().enumerate().skip(1) {
                let (Some(column), Some(cell)) = (header.as_str(), cells.get(index)) else {
                    continue;
                };
                values.insert(format!("{section}.{column}.{row_label}"), cell.clone());
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_rows_become_float_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "summary.csv",
            "insert_size:,310\nq30,97.5%\nheader,only,three\nnot_a_number,NA\n",
        );
        let metrics = parse_metrics(&path).unwrap();
        assert_eq!(metrics["insert_size"], Value::from(310.0));
        assert_eq!(metrics["q30"], Value::from(97.5));
        // wrong width and non-numeric rows are skipped
        assert_eq!(metrics.len(), 2);
    }

    #[test]
    fn nested_tables_flatten_to_namespaced_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "stats.json",
            r#"{
                "VariantStatsTable": {
                    "header": ["Type", "Count", "dbSNP"],
                    "rows": [["Insertions", 120, 88], ["Deletions", 95, 70]]
                },
                "Meta": {"version": 2}
            }"#,
        );
        let metrics = parse_metrics(&path).unwrap();
        assert_eq!(metrics["VariantStatsTable.Count.Insertions"], Value::from(120));
        assert_eq!(metrics["VariantStatsTable.dbSNP.Deletions"], Value::from(70));
        // sections without a header list are skipped
        assert!(!metrics.keys().any(|k| k.starts_with("Meta")));
    }

    #[test]
    fn table_section_without_rows_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "stats.json",
            r#"{"T": {"header": ["a", "b"]}}"#,
        );
        assert!(parse_metrics(&path).is_err());
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "stats.xml", "<x/>");
        let err = parse_metrics(&path).unwrap_err();
        assert!(err.to_string().contains("unknown extension"));
    }
}
