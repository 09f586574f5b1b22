//! Dynamically-typed field values

use super::Record;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// One field of a backend row or document
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),

    /// Raw bytes, serialized as base64
    Bytes(Vec<u8>),

    List(Vec<Value>),

    /// Already-structured JSON, serialized as is
    Json(serde_json::Value),

    /// Nested record built from dotted scalar fields
    Object(Record),

    /// Nested records built from dotted list fields
    Records(Vec<Record>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Json(serde_json::Value::Null))
    }

    /// Canonical text used when rendering keys and CSV cells
    ///
    /// `None` for null. Structured values fall back to their JSON text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Value::Json(json) => crate::pattern::json_text(json),
            other => serde_json::to_string(other).ok(),
        }
    }

    /// Elements of a list-shaped value
    pub fn into_list(self) -> Result<Vec<Value>, Value> {
        match self {
            Value::List(items) => Ok(items),
            Value::Json(serde_json::Value::Array(items)) => {
                Ok(items.into_iter().map(Value::from).collect())
            }
            other => Err(other),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Value::List(_) | Value::Json(serde_json::Value::Array(_))
        )
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&STANDARD.encode(b)),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Json(json) => json.serialize(serializer),
            Value::Object(record) => record.serialize(serializer),
            Value::Records(records) => {
                let mut seq = serializer.serialize_seq(Some(records.len()))?;
                for record in records {
                    seq.serialize_element(record)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_variants() {
        let value = Value::List(vec![
            Value::Null,
            Value::Int(1),
            Value::Text("a".into()),
            Value::Bytes(b"hi".to_vec()),
            Value::Json(json!({"k": [1, 2]})),
        ]);
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!([null, 1, "a", "aGk=", {"k": [1, 2]}])
        );
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Value::Float(2.5).to_text().as_deref(), Some("2.5"));
        assert_eq!(Value::Json(json!("x")).to_text().as_deref(), Some("x"));
        assert_eq!(Value::Json(json!([1])).to_text().as_deref(), Some("[1]"));
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_text().as_deref(),
            Some("[1,2]")
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from(json!(3)), Value::Int(3));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
        assert_eq!(
            Value::from(json!(["a"])),
            Value::List(vec![Value::Text("a".into())])
        );
    }
}
