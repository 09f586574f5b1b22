//! Declarative datatype coercion

use super::{Record, Value};
use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target type of a coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    #[serde(alias = "text", alias = "str")]
    String,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "double", alias = "number")]
    Float,
    #[serde(alias = "boolean")]
    Bool,
    /// Strict JSON: invalid text is an error
    Json,
    /// Lenient JSON: invalid text stays a string
    #[serde(alias = "json_or_string")]
    JsonOrString,
}

impl DataType {
    fn as_str(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Bool => "bool",
            DataType::Json => "json",
            DataType::JsonOrString => "json-or-string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{name, type}` entry of a bind's `datatype_mapping`
///
/// `name` is a field name or a dotted path into nested records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatatypeMapping {
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: DataType,
}

impl DatatypeMapping {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        DatatypeMapping {
            name: name.into(),
            datatype,
        }
    }
}

impl Record {
    /// Apply every mapping in order
    ///
    /// A field literally named like the mapping wins over the dotted path.
    /// Absent fields are skipped.
    pub fn cast(&mut self, mappings: &[DatatypeMapping]) -> Result<(), RecordError> {
        for mapping in mappings {
            if self.contains(&mapping.name) {
                cast_path(self, &[mapping.name.as_str()], &mapping.name, mapping.datatype)?;
            } else {
                let path: Vec<&str> = mapping.name.split('.').collect();
                cast_path(self, &path, &mapping.name, mapping.datatype)?;
            }
        }
        Ok(())
    }
}

fn cast_path(
    record: &mut Record,
    path: &[&str],
    full: &str,
    to: DataType,
) -> Result<(), RecordError> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(());
    };
    let Some(value) = record.get_mut(head) else {
        return Ok(());
    };

    if rest.is_empty() {
        let current = std::mem::replace(value, Value::Null);
        *value = cast_value(current, to, full)?;
        return Ok(());
    }

    match value {
        Value::Records(rows) => rows
            .iter_mut()
            .try_for_each(|row| cast_path(row, rest, full, to)),
        Value::Object(inner) => cast_path(inner, rest, full, to),
        Value::Null => Ok(()),
        _ => Err(RecordError::UnsupportedConversion(full.to_string())),
    }
}

fn cast_error(field: &str, to: DataType, value: &Value) -> RecordError {
    RecordError::Cast {
        field: field.to_string(),
        to: to.as_str(),
        value: value.to_text().unwrap_or_else(|| "null".to_string()),
    }
}

fn cast_value(value: Value, to: DataType, field: &str) -> Result<Value, RecordError> {
    if value.is_null() {
        return Ok(match to {
            DataType::Json | DataType::JsonOrString => Value::Json(serde_json::Value::Null),
            _ => Value::Null,
        });
    }

    match to {
        DataType::String => match value {
            Value::Text(_) => Ok(value),
            Value::Json(serde_json::Value::String(s)) => Ok(Value::Text(s)),
            other => other
                .to_text()
                .map(Value::Text)
                .ok_or_else(|| cast_error(field, to, &Value::Null)),
        },
        DataType::Int => to_int(&value)
            .map(Value::Int)
            .ok_or_else(|| cast_error(field, to, &value)),
        DataType::Float => to_float(&value)
            .map(Value::Float)
            .ok_or_else(|| cast_error(field, to, &value)),
        DataType::Bool => to_bool(&value)
            .map(Value::Bool)
            .ok_or_else(|| cast_error(field, to, &value)),
        DataType::Json | DataType::JsonOrString => match value {
            Value::Json(_) => Ok(value),
            Value::Text(text) => match parse_json(text.as_bytes()) {
                Some(json) => Ok(Value::Json(json)),
                None if to == DataType::JsonOrString || text.is_empty() => Ok(Value::Text(text)),
                None => Err(cast_error(field, to, &Value::Text(text))),
            },
            Value::Bytes(bytes) => match parse_json(&bytes) {
                Some(json) => Ok(Value::Json(json)),
                None if to == DataType::JsonOrString => {
                    Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()))
                }
                None => Err(cast_error(field, to, &Value::Bytes(bytes))),
            },
            other => serde_json::to_value(&other)
                .map(Value::Json)
                .map_err(|_| cast_error(field, to, &other)),
        },
    }
}

fn parse_json(raw: &[u8]) -> Option<serde_json::Value> {
    serde_json::from_slice(raw).ok()
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Text(_) | Value::Bytes(_) | Value::Json(_) => {
            let text = value.to_text()?;
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(*f),
        Value::Int(i) => Some(*i as f64),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Text(_) | Value::Bytes(_) | Value::Json(_) => value.to_text()?.trim().parse().ok(),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(i) => Some(*i != 0),
        Value::Float(f) => Some(*f != 0.0),
        Value::Text(_) | Value::Bytes(_) | Value::Json(_) => {
            match value.to_text()?.trim().to_ascii_lowercase().as_str() {
                "1" | "t" | "true" | "y" | "yes" | "on" => Some(true),
                "" | "0" | "f" | "false" | "n" | "no" | "off" => Some(false),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(name: &str, datatype: DataType) -> DatatypeMapping {
        DatatypeMapping::new(name, datatype)
    }

    #[test]
    fn test_cast_int_from_text() {
        let mut record: Record = [("age", "20")].into_iter().collect();
        record.cast(&[mapping("age", DataType::Int)]).unwrap();
        assert_eq!(record.get("age"), Some(&Value::Int(20)));
    }

    #[test]
    fn test_cast_scalars() {
        let mut record: Record = [
            ("price", Value::from("12.5")),
            ("active", Value::from("yes")),
            ("code", Value::Int(7)),
        ]
        .into_iter()
        .collect();

        record
            .cast(&[
                mapping("price", DataType::Float),
                mapping("active", DataType::Bool),
                mapping("code", DataType::String),
            ])
            .unwrap();

        assert_eq!(record.get("price"), Some(&Value::Float(12.5)));
        assert_eq!(record.get("active"), Some(&Value::Bool(true)));
        assert_eq!(record.get("code"), Some(&Value::Text("7".into())));
    }

    #[test]
    fn test_cast_invalid_int_fails() {
        let mut record: Record = [("age", "twenty")].into_iter().collect();
        let err = record.cast(&[mapping("age", DataType::Int)]).unwrap_err();
        assert!(matches!(err, RecordError::Cast { to: "int", .. }));
    }

    #[test]
    fn test_cast_null_to_json() {
        let mut record: Record = [("meta", Value::Null)].into_iter().collect();
        record.cast(&[mapping("meta", DataType::Json)]).unwrap();
        assert_eq!(record.get("meta"), Some(&Value::Json(serde_json::Value::Null)));
        assert_eq!(serde_json::to_value(&record).unwrap(), json!({"meta": null}));
    }

    #[test]
    fn test_cast_json_policies() {
        let mut record: Record = [
            ("good", Value::from(r#"{"a":1}"#)),
            ("bad", Value::from("not json")),
        ]
        .into_iter()
        .collect();

        record
            .cast(&[
                mapping("good", DataType::Json),
                mapping("bad", DataType::JsonOrString),
            ])
            .unwrap();
        assert_eq!(record.get("good"), Some(&Value::Json(json!({"a": 1}))));
        assert_eq!(record.get("bad"), Some(&Value::Text("not json".into())));

        let err = record.cast(&[mapping("bad", DataType::Json)]).unwrap_err();
        assert!(matches!(err, RecordError::Cast { to: "json", .. }));
    }

    #[test]
    fn test_cast_through_nested_records() {
        let record: Record = [
            ("staff.name", Value::from(vec!["a", "b"])),
            ("staff.age", Value::from(vec!["1", "2"])),
        ]
        .into_iter()
        .collect();
        let mut record = record.reshape_nested().unwrap();

        record.cast(&[mapping("staff.age", DataType::Int)]).unwrap();
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"staff": [{"name": "a", "age": 1}, {"name": "b", "age": 2}]})
        );
    }

    #[test]
    fn test_cast_path_through_scalar_fails() {
        let mut record: Record = [("staff", "x")].into_iter().collect();
        let err = record.cast(&[mapping("staff.age", DataType::Int)]).unwrap_err();
        assert!(matches!(err, RecordError::UnsupportedConversion(path) if path == "staff.age"));
    }

    #[test]
    fn test_mapping_deserializes_type_names() {
        let parsed: Vec<DatatypeMapping> = serde_json::from_value(json!([
            {"name": "a", "type": "int"},
            {"name": "b", "type": "json-or-string"},
            {"name": "c", "type": "boolean"},
        ]))
        .unwrap();

        assert_eq!(parsed[0].datatype, DataType::Int);
        assert_eq!(parsed[1].datatype, DataType::JsonOrString);
        assert_eq!(parsed[2].datatype, DataType::Bool);
    }
}
