//! Backend-native values before normalization
//!
//! Drivers decode their wire types into this closed set through a
//! per-type conversion table; `Value::from` then normalizes them into the
//! record model.

use super::Value;

/// A decoded backend column
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    TextArray(Vec<Option<String>>),
    IntArray(Vec<Option<i64>>),
    FloatArray(Vec<Option<f64>>),
    BoolArray(Vec<Option<bool>>),
    RawJson(serde_json::Value),
}

fn list<T>(items: Vec<Option<T>>, wrap: fn(T) -> Value) -> Value {
    Value::List(
        items
            .into_iter()
            .map(|item| item.map_or(Value::Null, wrap))
            .collect(),
    )
}

impl From<NativeValue> for Value {
    fn from(native: NativeValue) -> Self {
        match native {
            NativeValue::Null => Value::Null,
            NativeValue::Bool(b) => Value::Bool(b),
            NativeValue::Int(i) => Value::Int(i),
            NativeValue::Float(f) => Value::Float(f),
            NativeValue::Text(s) => Value::Text(s),
            NativeValue::Bytes(b) => Value::Bytes(b),
            NativeValue::TextArray(items) => list(items, Value::Text),
            NativeValue::IntArray(items) => list(items, Value::Int),
            NativeValue::FloatArray(items) => list(items, Value::Float),
            NativeValue::BoolArray(items) => list(items, Value::Bool),
            NativeValue::RawJson(json) => Value::Json(json),
        }
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(NativeValue::Null, Into::into)
    }
}

impl From<bool> for NativeValue {
    fn from(b: bool) -> Self {
        NativeValue::Bool(b)
    }
}

impl From<i16> for NativeValue {
    fn from(i: i16) -> Self {
        NativeValue::Int(i64::from(i))
    }
}

impl From<i32> for NativeValue {
    fn from(i: i32) -> Self {
        NativeValue::Int(i64::from(i))
    }
}

impl From<i64> for NativeValue {
    fn from(i: i64) -> Self {
        NativeValue::Int(i)
    }
}

impl From<u32> for NativeValue {
    fn from(i: u32) -> Self {
        NativeValue::Int(i64::from(i))
    }
}

impl From<f32> for NativeValue {
    fn from(f: f32) -> Self {
        NativeValue::Float(f64::from(f))
    }
}

impl From<f64> for NativeValue {
    fn from(f: f64) -> Self {
        NativeValue::Float(f)
    }
}

impl From<String> for NativeValue {
    fn from(s: String) -> Self {
        NativeValue::Text(s)
    }
}

impl From<Vec<u8>> for NativeValue {
    fn from(b: Vec<u8>) -> Self {
        NativeValue::Bytes(b)
    }
}

impl From<serde_json::Value> for NativeValue {
    fn from(json: serde_json::Value) -> Self {
        NativeValue::RawJson(json)
    }
}
