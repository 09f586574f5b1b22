//! Folding of dotted field names into nested records
//!
//! Fields sharing a prefix are grouped under that prefix:
//!
//! ```text
//! {"staff.name": ["a", "b"], "staff.age": ["1", "2"]}
//!   => {"staff": [{"name": "a", "age": "1"}, {"name": "b", "age": "2"}]}
//!
//! {"owner.name": "a", "owner.address.city": "b"}
//!   => {"owner": {"name": "a", "address": {"city": "b"}}}
//! ```

use super::{Record, Value};
use crate::error::RecordError;
use std::collections::BTreeMap;

impl Record {
    /// Group dotted fields by prefix
    ///
    /// List-valued siblings become a list of records aligned by position and
    /// must all have the same length. Scalar siblings become one nested
    /// record. Mixing both under one prefix, or a plain field named like a
    /// prefix, fails with [`RecordError::Reorganize`].
    pub fn reshape_nested(self) -> Result<Record, RecordError> {
        let mut out = Record::new();
        let mut groups: BTreeMap<String, Vec<(String, Value)>> = BTreeMap::new();

        for (field, value) in self {
            match field.split_once('.') {
                Some((prefix, rest)) if !prefix.is_empty() && !rest.is_empty() => {
                    groups
                        .entry(prefix.to_string())
                        .or_default()
                        .push((rest.to_string(), value));
                }
                _ => {
                    out.insert(field, value);
                }
            }
        }

        for (prefix, members) in groups {
            if out.contains(&prefix) {
                return Err(RecordError::Reorganize(prefix));
            }
            let nested = fold_group(&prefix, members)?;
            out.insert(prefix, nested);
        }

        Ok(out)
    }
}

fn fold_group(prefix: &str, members: Vec<(String, Value)>) -> Result<Value, RecordError> {
    let lists = members.iter().filter(|(_, value)| value.is_list()).count();

    if lists == 0 {
        let mut object = Record::new();
        for (path, value) in members {
            insert_path(&mut object, &path, value, prefix)?;
        }
        return Ok(Value::Object(object));
    }

    if lists != members.len() {
        return Err(RecordError::Reorganize(prefix.to_string()));
    }

    let mut rows: Option<Vec<Record>> = None;
    for (path, value) in members {
        let items = value
            .into_list()
            .map_err(|_| RecordError::Reorganize(prefix.to_string()))?;

        let rows = rows.get_or_insert_with(|| vec![Record::new(); items.len()]);
        if rows.len() != items.len() {
            return Err(RecordError::Reorganize(prefix.to_string()));
        }
        for (row, item) in rows.iter_mut().zip(items) {
            insert_path(row, &path, item, prefix)?;
        }
    }

    Ok(Value::Records(rows.unwrap_or_default()))
}

fn insert_path(
    record: &mut Record,
    path: &str,
    value: Value,
    prefix: &str,
) -> Result<(), RecordError> {
    match path.split_once('.') {
        None => {
            if record.contains(path) {
                return Err(RecordError::Reorganize(prefix.to_string()));
            }
            record.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let entry = record
                .0
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Record::new()));
            match entry {
                Value::Object(inner) => insert_path(inner, rest, value, prefix),
                _ => Err(RecordError::Reorganize(prefix.to_string())),
            }
        }
    }
}
