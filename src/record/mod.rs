//! Generic record model
//!
//! A [`Record`] is one backend row or document: field names mapped to
//! dynamically-typed [`Value`]s. Bindings post-process every fetched record
//! with [`Record::reshape_nested`] and then [`Record::cast`].

mod cast;
mod native;
mod reshape;
mod value;

pub use cast::{DataType, DatatypeMapping};
pub use native::NativeValue;
pub use value::Value;

use crate::pattern::ValueSource;
use serde::Serialize;
use std::collections::BTreeMap;

/// Field name to value mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Text of a field, empty when absent or null
    pub fn text(&self, field: &str) -> String {
        self.get(field).and_then(Value::to_text).unwrap_or_default()
    }
}

impl ValueSource for Record {
    fn value_of(&self, name: &str) -> Option<String> {
        self.get(name).and_then(Value::to_text)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
