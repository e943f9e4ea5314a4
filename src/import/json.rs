use serde_json::Value;

use super::{looks_like_school, ImportError, ParsedImport, RawRow};
use crate::backup::RegistryDocument;
use crate::text::normalize_key;

/// A `{schools?, students?}` backup object, or an array of school-like or
/// student-like objects.
pub fn parse_json(text: &str) -> Result<ParsedImport, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    if let Some(obj) = value.as_object() {
        if !obj.contains_key("schools") && !obj.contains_key("students") {
            return Err(ImportError::UnrecognizedJson);
        }
        let doc: RegistryDocument = serde_json::from_value(value)?;
        return Ok(ParsedImport::Backup(doc));
    }
    match value {
        Value::Array(items) => {
            let rows: Vec<RawRow> = items
                .iter()
                .filter_map(|v| v.as_object())
                .map(|obj| {
                    let mut row = RawRow::default();
                    for (k, v) in obj {
                        row.insert(normalize_key(k), stringify(v));
                    }
                    row
                })
                .filter(RawRow::has_any_value)
                .collect();
            let Some(first) = rows.first() else {
                return Err(ImportError::NoRows("JSON"));
            };
            if looks_like_school(first) {
                Ok(ParsedImport::SchoolRows(rows))
            } else {
                Ok(ParsedImport::StudentRows(rows))
            }
        }
        _ => Err(ImportError::UnrecognizedJson),
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => v.to_string(),
    }
}
