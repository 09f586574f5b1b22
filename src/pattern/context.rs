//! Execution context and value sources

use std::collections::HashMap;

/// Anything a pattern can be rendered from
pub trait ValueSource {
    /// Canonical string form of a named value, `None` when absent
    fn value_of(&self, name: &str) -> Option<String>;
}

/// Per-request variable bindings
///
/// Filled while matching a key, then read back when rendering keys or
/// resolving query arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecContext {
    values: HashMap<String, String>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge a decoded JSON object
    ///
    /// Strings are taken verbatim, other scalars and nested values use their
    /// JSON text, and `null` removes the field.
    pub fn merge_json(&mut self, object: serde_json::Map<String, serde_json::Value>) {
        for (name, value) in object {
            match json_text(&value) {
                Some(text) => self.set(name, text),
                None => {
                    self.remove(&name);
                }
            }
        }
    }
}

impl ValueSource for ExecContext {
    fn value_of(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

impl ValueSource for HashMap<String, String> {
    fn value_of(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExecContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ExecContext {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Text form of a JSON value as used for key rendering
pub(crate) fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_json_overrides_and_removes() {
        let mut ctx: ExecContext = [("id", "1"), ("name", "old"), ("gone", "x")]
            .into_iter()
            .collect();

        let payload = json!({"name": "new", "age": 20, "active": true, "gone": null});
        if let serde_json::Value::Object(map) = payload {
            ctx.merge_json(map);
        }

        assert_eq!(ctx.get("id"), Some("1"));
        assert_eq!(ctx.get("name"), Some("new"));
        assert_eq!(ctx.get("age"), Some("20"));
        assert_eq!(ctx.get("active"), Some("true"));
        assert_eq!(ctx.get("gone"), None);
    }
}
