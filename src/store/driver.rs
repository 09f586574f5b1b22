//! Store routing keys through an ordered list of bindings

use super::{Binding, BindConfig, ChangeEvent, ChangeNotifier, Executor, Store};
use crate::error::{Result, StoreError};
use crate::pattern::ExecContext;
use crate::query::Syntax;
use crate::record::Record;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Binding-driven store over one executor
///
/// Bindings are scanned in registration order; the first one whose
/// namespace and pattern match the key wins.
pub struct BindingStore {
    driver: String,
    executor: Arc<dyn Executor>,
    syntax: Arc<dyn Syntax>,
    bindings: RwLock<Vec<Arc<Binding>>>,
}

impl BindingStore {
    pub fn new(driver: impl Into<String>, executor: Arc<dyn Executor>, syntax: Arc<dyn Syntax>) -> Self {
        BindingStore {
            driver: driver.into(),
            executor,
            syntax,
            bindings: RwLock::new(Vec::new()),
        }
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Snapshot so that no lock is held across backend calls
    fn bindings(&self) -> Vec<Arc<Binding>> {
        self.bindings.read().clone()
    }

    fn route(&self, dbnum: u32, key: &str) -> Result<(Arc<Binding>, ExecContext)> {
        for binding in self.bindings() {
            if binding.dbnum() != dbnum {
                continue;
            }
            let mut ctx = ExecContext::new();
            if binding.match_key(key, &mut ctx) {
                return Ok((binding, ctx));
            }
        }
        Err(StoreError::NoKey)
    }

    fn matching(&self, dbnum: u32, pattern: &str) -> Vec<Arc<Binding>> {
        self.bindings()
            .into_iter()
            .filter(|binding| binding.dbnum() == dbnum && binding.match_pattern(pattern))
            .collect()
    }
}

#[async_trait]
impl Store for BindingStore {
    async fn get(&self, dbnum: u32, key: &str) -> Result<Bytes> {
        let (binding, ctx) = self.route(dbnum, key)?;
        let record = binding.get(&ctx).await?;
        Ok(Bytes::from(serde_json::to_vec(&record)?))
    }

    async fn set(&self, dbnum: u32, key: &str, value: Bytes) -> Result<()> {
        let (binding, mut ctx) = self.route(dbnum, key)?;
        binding.upsert(&mut ctx, &value).await
    }

    async fn del(&self, dbnum: u32, key: &str) -> Result<()> {
        let (binding, ctx) = self.route(dbnum, key)?;
        binding.del(&ctx).await
    }

    async fn keys(&self, dbnum: u32, pattern: &str) -> Result<Vec<String>> {
        let bindings = self.matching(dbnum, pattern);
        if bindings.is_empty() {
            return Err(StoreError::NoKey);
        }

        let mut keys = Vec::new();
        for binding in bindings {
            let records = binding.list(&ExecContext::new()).await?;
            keys.extend(records.iter().map(|record| binding.pattern().format(record)));
        }
        Ok(keys)
    }

    async fn list(&self, dbnum: u32, pattern: &str) -> Result<Vec<Record>> {
        let bindings = self.matching(dbnum, pattern);
        if bindings.is_empty() {
            return Err(StoreError::NoKey);
        }

        let mut records = Vec::new();
        for binding in bindings {
            records.extend(binding.list(&ExecContext::new()).await?);
        }
        Ok(records)
    }

    async fn bind(&self, conf: &BindConfig) -> Result<()> {
        let binding = Binding::from_config(conf, self.syntax.as_ref(), self.executor.clone())?;
        debug!(driver = %self.driver, ?binding, "bind");
        self.bindings.write().push(Arc::new(binding));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.executor.close().await
    }

    fn change_notifier(&self) -> Option<&dyn ChangeNotifier> {
        self.executor
            .notifications()
            .map(|_| self as &dyn ChangeNotifier)
    }
}

#[async_trait]
impl ChangeNotifier for BindingStore {
    async fn listen_updates(&self, channel: &str, events: mpsc::Sender<ChangeEvent>) -> Result<()> {
        match self.executor.notifications() {
            Some(source) => source.listen(channel, events).await,
            None => Err(StoreError::MethodIsNotSupported),
        }
    }

    /// First binding declared on the event's table renders the key
    fn resolve_key(&self, event: &ChangeEvent) -> Option<(u32, String)> {
        self.bindings()
            .into_iter()
            .find(|binding| binding.table() == Some(event.table.as_str()))
            .map(|binding| (binding.dbnum(), binding.pattern().format(&event.fields)))
    }
}
