//! Store contract and the binding-driven backends
//!
//! Every backend implements [`Store`]. Key families are attached with
//! [`Store::bind`]; a store then routes each key to the first binding whose
//! namespace and pattern match.

mod binding;
mod driver;
mod executor;
pub mod glob;
mod registry;
mod stream;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use binding::Binding;
pub use driver::BindingStore;
pub use executor::{Executor, NotificationSource};
pub use registry::{ConnectContext, ConnectorRegistry, StoreConnector};
pub use stream::StreamStore;

use crate::error::Result;
use crate::pattern::ExecContext;
use crate::record::{DatatypeMapping, Record};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::mpsc;

/// Backend capability consumed by the dispatcher, the REST mirror and the
/// proxy/aggregator layers
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, dbnum: u32, key: &str) -> Result<Bytes>;

    async fn set(&self, dbnum: u32, key: &str, value: Bytes) -> Result<()>;

    async fn del(&self, dbnum: u32, key: &str) -> Result<()>;

    /// Concrete keys whose binding pattern matches the glob
    async fn keys(&self, dbnum: u32, pattern: &str) -> Result<Vec<String>>;

    /// Records behind the keys [`Store::keys`] would return
    async fn list(&self, dbnum: u32, pattern: &str) -> Result<Vec<Record>>;

    async fn bind(&self, conf: &BindConfig) -> Result<()>;

    async fn close(&self) -> Result<()>;

    /// Whether a cache-aside proxy may wrap this store
    fn supports_cache(&self) -> bool {
        true
    }

    fn change_notifier(&self) -> Option<&dyn ChangeNotifier> {
        None
    }
}

/// One committed change reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: String,
    pub fields: ExecContext,
}

/// Optional change-notification capability of a store
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Subscribe to `channel` and forward every event until the
    /// subscription fails or the receiver is dropped
    async fn listen_updates(&self, channel: &str, events: mpsc::Sender<ChangeEvent>) -> Result<()>;

    /// Namespace and concrete key affected by an event
    fn resolve_key(&self, event: &ChangeEvent) -> Option<(u32, String)>;
}

/// Declarative description of one key family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    #[serde(alias = "pattern")]
    pub key: String,
    pub dbnum: u32,
    #[serde(deserialize_with = "non_empty")]
    pub table_name: Option<String>,
    pub readonly: bool,
    #[serde(deserialize_with = "non_empty")]
    pub where_ext: Option<String>,
    #[serde(deserialize_with = "non_empty")]
    pub get_query: Option<String>,
    #[serde(deserialize_with = "non_empty")]
    pub list_query: Option<String>,
    #[serde(deserialize_with = "non_empty")]
    pub upsert_query: Option<String>,
    #[serde(deserialize_with = "non_empty")]
    pub del_query: Option<String>,
    pub reorganize_nested: bool,
    pub datatype_mapping: Vec<DatatypeMapping>,
}

impl BindConfig {
    /// Bind config synthesized from a table name
    pub fn table(key: impl Into<String>, dbnum: u32, table_name: impl Into<String>) -> Self {
        BindConfig {
            key: key.into(),
            dbnum,
            table_name: Some(table_name.into()),
            ..Default::default()
        }
    }

    /// Bind config with an explicit get template
    pub fn query(key: impl Into<String>, dbnum: u32, get_query: impl Into<String>) -> Self {
        BindConfig {
            key: key.into(),
            dbnum,
            get_query: Some(get_query.into()),
            ..Default::default()
        }
    }
}

/// Blank strings in YAML mean "not configured"
fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_config_from_yaml() {
        let conf: BindConfig = serde_yaml::from_str(
            r#"
key: "user_{{id}}"
dbnum: 2
table_name: users
get_query: ""
datatype_mapping:
  - { name: age, type: int }
"#,
        )
        .unwrap();

        assert_eq!(conf.key, "user_{{id}}");
        assert_eq!(conf.dbnum, 2);
        assert_eq!(conf.table_name.as_deref(), Some("users"));
        assert_eq!(conf.get_query, None);
        assert!(!conf.readonly);
        assert_eq!(conf.datatype_mapping.len(), 1);
    }

    #[test]
    fn test_bind_config_pattern_alias() {
        let conf: BindConfig = serde_yaml::from_str("pattern: events").unwrap();
        assert_eq!(conf.key, "events");
    }
}
