//! Scripted collaborators shared by the unit tests

use crate::cache::Cache;
use crate::error::{Result, StoreError};
use crate::query::Query;
use crate::record::Record;
use crate::store::{glob, BindConfig, ChangeEvent, ChangeNotifier, Executor, NotificationSource, Store};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// SQL mock: replays canned rows and affected counts, records statements
#[derive(Default)]
pub(crate) struct MockExecutor {
    rows: Mutex<VecDeque<Vec<Record>>>,
    affected: Mutex<VecDeque<u64>>,
    statements: Mutex<Vec<(String, Vec<Option<String>>)>>,
    events: Mutex<Option<Vec<ChangeEvent>>>,
    notify: bool,
    pub closed: AtomicBool,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that also exposes a change feed replaying `events`
    pub fn with_events(events: Vec<ChangeEvent>) -> Self {
        MockExecutor {
            events: Mutex::new(Some(events)),
            notify: true,
            ..Default::default()
        }
    }

    pub fn push_rows(&self, rows: Vec<Record>) {
        self.rows.lock().push_back(rows);
    }

    pub fn push_affected(&self, count: u64) {
        self.affected.lock().push_back(count);
    }

    pub fn statements(&self) -> Vec<(String, Vec<Option<String>>)> {
        self.statements.lock().clone()
    }

    fn record(&self, query: &Query, args: &[Option<String>]) {
        self.statements
            .lock()
            .push((query.statement().to_string(), args.to_vec()));
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn fetch(&self, query: &Query, args: &[Option<String>]) -> Result<Vec<Record>> {
        self.record(query, args);
        Ok(self.rows.lock().pop_front().unwrap_or_default())
    }

    async fn execute(&self, query: &Query, args: &[Option<String>]) -> Result<u64> {
        self.record(query, args);
        Ok(self.affected.lock().pop_front().unwrap_or(1))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn notifications(&self) -> Option<&dyn NotificationSource> {
        self.notify.then_some(self as &dyn NotificationSource)
    }
}

#[async_trait]
impl NotificationSource for MockExecutor {
    async fn listen(&self, _channel: &str, events: mpsc::Sender<ChangeEvent>) -> Result<()> {
        let scripted = self.events.lock().take().unwrap_or_default();
        for event in scripted {
            if events.send(event).await.is_err() {
                return Ok(());
            }
        }
        events.closed().await;
        Ok(())
    }
}

/// In-memory store fake with call counters
///
/// With a routing prefix, keys outside it answer `NoKey` like an unbound
/// key family.
#[derive(Default)]
pub(crate) struct MemoryStore {
    prefix: Option<String>,
    data: Mutex<HashMap<(u32, String), Bytes>>,
    events: Mutex<Option<Vec<ChangeEvent>>>,
    notify: bool,
    cacheable: bool,
    fail_close: bool,
    reject_binds: bool,
    failure: Mutex<Option<String>>,
    listen_failures: AtomicUsize,
    pub listens: AtomicUsize,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub dels: AtomicUsize,
    pub closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            cacheable: true,
            ..Default::default()
        }
    }

    pub fn with_prefix(prefix: &str) -> Self {
        MemoryStore {
            prefix: Some(prefix.to_string()),
            ..Self::new()
        }
    }

    /// Change feed replaying `events`; the key is read from the `key` field
    pub fn with_events(mut self, events: Vec<ChangeEvent>) -> Self {
        self.events = Mutex::new(Some(events));
        self.notify = true;
        self
    }

    /// The first `count` subscriptions drop with a backend error
    pub fn failing_listens(self, count: usize) -> Self {
        self.listen_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn uncacheable(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn insert(&self, dbnum: u32, key: &str, value: &str) {
        self.data
            .lock()
            .insert((dbnum, key.to_string()), Bytes::copy_from_slice(value.as_bytes()));
    }

    /// Every bind fails as a configuration defect
    pub fn rejecting_binds(mut self) -> Self {
        self.reject_binds = true;
        self
    }

    /// Make every later get, set and del fail with a backend error
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn contains(&self, dbnum: u32, key: &str) -> bool {
        self.data.lock().contains_key(&(dbnum, key.to_string()))
    }

    fn route(&self, key: &str) -> Result<()> {
        if let Some(message) = self.failure.lock().as_deref() {
            return Err(StoreError::backend(message));
        }
        match &self.prefix {
            Some(prefix) if !key.starts_with(prefix.as_str()) => Err(StoreError::NoKey),
            _ => Ok(()),
        }
    }

    fn route_pattern(&self, pattern: &str) -> Result<()> {
        match &self.prefix {
            Some(prefix) if !glob::matches(pattern, &format!("{prefix}key")) => {
                Err(StoreError::NoKey)
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, dbnum: u32, key: &str) -> Result<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.route(key)?;
        self.data
            .lock()
            .get(&(dbnum, key.to_string()))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn set(&self, dbnum: u32, key: &str, value: Bytes) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.route(key)?;
        self.data.lock().insert((dbnum, key.to_string()), value);
        Ok(())
    }

    async fn del(&self, dbnum: u32, key: &str) -> Result<()> {
        self.dels.fetch_add(1, Ordering::SeqCst);
        self.route(key)?;
        self.data
            .lock()
            .remove(&(dbnum, key.to_string()))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn keys(&self, dbnum: u32, pattern: &str) -> Result<Vec<String>> {
        self.route_pattern(pattern)?;
        let mut keys: Vec<String> = self
            .data
            .lock()
            .keys()
            .filter(|(db, key)| *db == dbnum && glob::matches(pattern, key))
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list(&self, dbnum: u32, pattern: &str) -> Result<Vec<Record>> {
        let keys = self.keys(dbnum, pattern).await?;
        let data = self.data.lock();
        Ok(keys
            .into_iter()
            .map(|key| {
                let value = data
                    .get(&(dbnum, key.clone()))
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .unwrap_or_default();
                [("key", key), ("value", value)].into_iter().collect()
            })
            .collect())
    }

    async fn bind(&self, conf: &BindConfig) -> Result<()> {
        if self.reject_binds {
            return Err(StoreError::InvalidBindConfig(format!("cannot bind `{}`", conf.key)));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(StoreError::backend("close failed"));
        }
        Ok(())
    }

    fn supports_cache(&self) -> bool {
        self.cacheable
    }

    fn change_notifier(&self) -> Option<&dyn ChangeNotifier> {
        self.notify.then_some(self as &dyn ChangeNotifier)
    }
}

#[async_trait]
impl ChangeNotifier for MemoryStore {
    async fn listen_updates(&self, _channel: &str, events: mpsc::Sender<ChangeEvent>) -> Result<()> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .listen_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::backend("notification connection lost"));
        }

        let scripted = self.events.lock().take().unwrap_or_default();
        for event in scripted {
            if events.send(event).await.is_err() {
                return Ok(());
            }
        }
        events.closed().await;
        Ok(())
    }

    fn resolve_key(&self, event: &ChangeEvent) -> Option<(u32, String)> {
        event.fields.get("key").map(|key| (0, key.to_string()))
    }
}

/// Cache whose every call fails with a backend error
pub(crate) struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    fn with_prefix(&self, _prefix: &str) -> Arc<dyn Cache> {
        Arc::new(FailingCache)
    }

    async fn get(&self, _key: &str) -> Result<Bytes> {
        Err(StoreError::backend("cache unavailable"))
    }

    async fn set(&self, _key: &str, _value: Bytes) -> Result<()> {
        Err(StoreError::backend("cache unavailable"))
    }

    async fn del(&self, _key: &str) -> Result<()> {
        Err(StoreError::backend("cache unavailable"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
