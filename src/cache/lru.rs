//! Least-recently-used cache with creation-time TTL (`lru`)

use super::{Cache, CacheEntry, CacheOptions};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

struct Shared {
    entries: Mutex<::lru::LruCache<String, CacheEntry>>,
    ttl: Duration,
}

/// `lru::LruCache` behind a mutex, shared by its prefixed views
#[derive(Clone)]
pub struct LruCache {
    inner: Arc<Shared>,
    prefix: String,
    root: bool,
}

impl LruCache {
    pub fn new(options: CacheOptions) -> Self {
        let capacity = NonZeroUsize::new(options.size).unwrap_or(NonZeroUsize::MIN);
        LruCache {
            inner: Arc::new(Shared {
                entries: Mutex::new(::lru::LruCache::new(capacity)),
                ttl: options.ttl,
            }),
            prefix: String::new(),
            root: true,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl Cache for LruCache {
    fn with_prefix(&self, prefix: &str) -> Arc<dyn Cache> {
        Arc::new(LruCache {
            inner: self.inner.clone(),
            prefix: format!("{}{}", self.prefix, prefix),
            root: false,
        })
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let key = self.full_key(key);
        let mut entries = self.inner.entries.lock();
        match entries.get(&key) {
            Some(entry) if !entry.is_expired() => Ok(entry.value.clone()),
            Some(_) => {
                entries.pop(&key);
                Err(StoreError::NotFound)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        let entry = CacheEntry::new(value, self.inner.ttl);
        self.inner.entries.lock().put(self.full_key(key), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.inner
            .entries
            .lock()
            .pop(&self.full_key(key))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn close(&self) -> Result<()> {
        if self.root {
            self.inner.entries.lock().clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(size: usize) -> LruCache {
        LruCache::new(CacheOptions::new(size, Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_get_set_del() {
        let cache = cache(10);
        assert!(matches!(cache.get("k").await, Err(StoreError::NotFound)));

        cache.set("k", Bytes::from("v")).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Bytes::from("v"));

        cache.del("k").await.unwrap();
        assert!(matches!(cache.del("k").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let cache = cache(2);
        cache.set("a", Bytes::from("1")).await.unwrap();
        cache.set("b", Bytes::from("2")).await.unwrap();
        cache.get("a").await.unwrap();
        cache.set("c", Bytes::from("3")).await.unwrap();

        assert!(cache.get("a").await.is_ok());
        assert!(cache.get("b").await.is_err());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed() {
        let cache = LruCache::new(CacheOptions {
            size: 4,
            ttl: Duration::ZERO,
        });
        cache.set("k", Bytes::from("v")).await.unwrap();
        assert!(cache.get("k").await.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_prefix_view_close_keeps_storage() {
        let root = cache(4);
        let view = root.with_prefix("s0/");
        view.set("k", Bytes::from("v")).await.unwrap();
        view.close().await.unwrap();
        assert_eq!(root.get("s0/k").await.unwrap(), Bytes::from("v"));

        root.close().await.unwrap();
        assert!(root.is_empty());
    }
}
