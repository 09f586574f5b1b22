//! Write-only store publishing every `SET` to a broker channel

use super::{glob, BindConfig, Store};
use crate::error::{Result, StoreError};
use crate::pubsub::Publisher;
use crate::record::Record;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

struct StreamBind {
    dbnum: u32,
    key: String,
    published: AtomicU64,
}

/// Stream publisher store (`pubsub://[channel]`)
///
/// Binds are exact keys. `SET` publishes the value and `GET` answers how
/// many values were published through the key.
pub struct StreamStore {
    publisher: Arc<dyn Publisher>,
    /// Fixed channel; when empty each key publishes on its own name
    channel: String,
    binds: RwLock<Vec<Arc<StreamBind>>>,
}

impl StreamStore {
    pub fn new(publisher: Arc<dyn Publisher>, channel: impl Into<String>) -> Self {
        StreamStore {
            publisher,
            channel: channel.into(),
            binds: RwLock::new(Vec::new()),
        }
    }

    fn bind_by_key(&self, dbnum: u32, key: &str) -> Result<Arc<StreamBind>> {
        self.binds
            .read()
            .iter()
            .find(|b| b.dbnum == dbnum && b.key == key)
            .cloned()
            .ok_or(StoreError::NoKey)
    }
}

#[async_trait]
impl Store for StreamStore {
    async fn get(&self, dbnum: u32, key: &str) -> Result<Bytes> {
        let bind = self.bind_by_key(dbnum, key)?;
        Ok(Bytes::from(bind.published.load(Ordering::Relaxed).to_string()))
    }

    async fn set(&self, dbnum: u32, key: &str, value: Bytes) -> Result<()> {
        let bind = self.bind_by_key(dbnum, key)?;
        bind.published.fetch_add(1, Ordering::Relaxed);

        let channel = if self.channel.is_empty() {
            key
        } else {
            self.channel.as_str()
        };
        let receivers = self.publisher.publish(channel, value);
        debug!(dbnum, key, channel, receivers, "stream publish");
        Ok(())
    }

    async fn del(&self, dbnum: u32, key: &str) -> Result<()> {
        self.bind_by_key(dbnum, key)?;
        Err(StoreError::MethodIsNotSupported)
    }

    async fn keys(&self, dbnum: u32, pattern: &str) -> Result<Vec<String>> {
        Ok(self
            .binds
            .read()
            .iter()
            .filter(|b| b.dbnum == dbnum && glob::matches(pattern, &b.key))
            .map(|b| b.key.clone())
            .collect())
    }

    async fn list(&self, _dbnum: u32, _pattern: &str) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn bind(&self, conf: &BindConfig) -> Result<()> {
        self.binds.write().push(Arc::new(StreamBind {
            dbnum: conf.dbnum,
            key: conf.key.clone(),
            published: AtomicU64::new(0),
        }));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn supports_cache(&self) -> bool {
        false
    }
}
